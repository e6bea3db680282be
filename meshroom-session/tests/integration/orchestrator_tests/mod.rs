mod test_chat;
mod test_lifecycle;
