use meshroom_core::ChatMessage;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Insertion-ordered log of admitted chat events.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Arc<RwLock<Vec<ChatMessage>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, message: ChatMessage) {
        self.entries.write().await.push(message);
    }

    pub async fn snapshot(&self) -> Vec<ChatMessage> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
