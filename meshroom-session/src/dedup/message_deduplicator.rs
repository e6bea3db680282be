use meshroom_core::{ChatMessage, MessageKey};
use std::collections::HashSet;

/// Drops repeated broadcast deliveries by `(kind, timestamp, sender)`.
///
/// Keys are kept for the lifetime of the room membership.
#[derive(Debug, Default)]
pub struct MessageDeduplicator {
    seen: HashSet<MessageKey>,
}

impl MessageDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` only the first time this message's key is seen.
    pub fn admit(&mut self, message: &ChatMessage) -> bool {
        self.seen.insert(message.key())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
