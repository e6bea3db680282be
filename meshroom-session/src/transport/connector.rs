use crate::error::TransportError;
use async_trait::async_trait;
use meshroom_core::{Channel, Destination, UserId};
use serde_json::Value;

/// A payload pushed by the server on one of our subscriptions.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: Channel,
    pub body: Value,
}

/// One live connection to the signaling server.
#[async_trait]
pub trait SignalingLink: Send {
    async fn subscribe(&mut self, channel: &Channel) -> Result<(), TransportError>;

    async fn publish(&mut self, destination: Destination, body: Value) -> Result<(), TransportError>;

    /// Next delivery, or `None` once the connection is gone. Must be cancel safe.
    async fn next_frame(&mut self) -> Option<Delivery>;

    async fn close(&mut self);
}

/// Opens signaling connections on behalf of a user.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, user_id: &UserId) -> Result<Box<dyn SignalingLink>, TransportError>;
}
