mod message_deduplicator;

pub use message_deduplicator::*;
