use crate::error::TransportError;
use async_trait::async_trait;
use meshroom_core::SignalMessage;

/// Where peer sessions send their outgoing OFFER/ANSWER/ICE_CANDIDATE messages.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn emit(&self, message: SignalMessage) -> Result<(), TransportError>;
}
