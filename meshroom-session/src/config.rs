use crate::error::SessionError;
use crate::join::JoinConfig;
use crate::peer::PeerConfig;
use crate::transport::TransportConfig;
use meshroom_core::{RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who we are and where: the pair every component routes by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub display_name: String,
}

/// Everything a session needs to know before it starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub display_name: String,
    pub transport: TransportConfig,
    pub join: JoinConfig,
    pub peer: PeerConfig,

    /// Buffer of the session event bus; slow subscribers lag past this.
    pub event_capacity: usize,
}

impl SessionConfig {
    pub fn new(room_id: RoomId, user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            room_id,
            user_id,
            display_name: display_name.into(),
            transport: TransportConfig::default(),
            join: JoinConfig::default(),
            peer: PeerConfig::default(),
            event_capacity: 256,
        }
    }

    pub fn identity(&self) -> LocalIdentity {
        LocalIdentity {
            room_id: self.room_id.clone(),
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
        }
    }

    /// Defaults overridden by `MESHROOM_*` environment variables.
    pub fn from_env(room_id: RoomId, user_id: UserId, display_name: impl Into<String>) -> Self {
        let mut config = Self::new(room_id, user_id, display_name);

        if let Ok(url) = std::env::var("MESHROOM_SIGNALING_URL") {
            config.transport.url = url;
        }

        if let Ok(attempts) = std::env::var("MESHROOM_RECONNECT_ATTEMPTS") {
            if let Ok(val) = attempts.parse() {
                config.transport.max_attempts = val;
            }
        }

        if let Ok(backoff) = std::env::var("MESHROOM_RECONNECT_BACKOFF_MS") {
            if let Ok(val) = backoff.parse() {
                config.transport.backoff = Duration::from_millis(val);
            }
        }

        if let Ok(servers) = std::env::var("MESHROOM_ICE_SERVERS") {
            config.peer.ice_servers = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
        }

        config
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.room_id.is_empty() {
            return Err(SessionError::InvalidConfig("room_id must not be empty".into()));
        }

        if self.user_id.is_empty() {
            return Err(SessionError::InvalidConfig("user_id must not be empty".into()));
        }

        if self.transport.url.is_empty() {
            return Err(SessionError::InvalidConfig("signaling url must not be empty".into()));
        }

        if self.transport.max_attempts == 0 {
            return Err(SessionError::InvalidConfig("max_attempts must be > 0".into()));
        }

        if self.event_capacity == 0 {
            return Err(SessionError::InvalidConfig("event_capacity must be > 0".into()));
        }

        Ok(())
    }
}
