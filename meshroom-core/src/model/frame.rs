use crate::model::channel::{Channel, Destination};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames a client sends to the signaling server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe {
        channel: Channel,
    },
    Unsubscribe {
        channel: Channel,
    },
    Publish {
        destination: Destination,
        body: Value,
    },
}

/// Frames the signaling server pushes to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ServerFrame {
    Deliver { channel: Channel, body: Value },
    Error { reason: String },
}
