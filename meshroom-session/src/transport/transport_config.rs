use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Signaling connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// WebSocket endpoint of the signaling relay.
    pub url: String,

    /// Consecutive failed connection attempts tolerated before giving up.
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws".to_owned(),
            max_attempts: 5,
            backoff: Duration::from_secs(3),
        }
    }
}
