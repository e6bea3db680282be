use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// STUN/TURN urls handed to every peer connection.
    pub ice_servers: Vec<String>,

    /// Fresh offers a peer may receive from self-healing before we stop trying.
    pub heal_attempts: u32,

    /// Pause before re-offering after a remote description was rejected.
    pub heal_delay: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                "stun:stun.l.google.com:19302".to_owned(),
                "stun:stun1.l.google.com:19302".to_owned(),
                "stun:stun2.l.google.com:19302".to_owned(),
                "stun:stun3.l.google.com:19302".to_owned(),
                "stun:stun4.l.google.com:19302".to_owned(),
            ],
            heal_attempts: 3,
            heal_delay: Duration::from_secs(1),
        }
    }
}
