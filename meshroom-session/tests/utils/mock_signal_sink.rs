use async_trait::async_trait;
use meshroom_core::{SignalKind, SignalMessage, UserId};
use meshroom_session::{SignalSink, TransportError};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// SignalSink that captures everything a peer manager emits.
#[derive(Clone)]
pub struct MockSignalSink {
    tx: mpsc::UnboundedSender<SignalMessage>,
    signals: Arc<Mutex<Vec<SignalMessage>>>,
}

impl MockSignalSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SignalMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            signals: Arc::new(Mutex::new(Vec::new())),
        };
        (sink, rx)
    }

    pub async fn get_signals(&self) -> Vec<SignalMessage> {
        self.signals.lock().await.clone()
    }

    /// Signals of `kind` addressed to `peer`, in emission order.
    pub async fn sent_to(&self, peer: &UserId, kind: SignalKind) -> Vec<SignalMessage> {
        self.signals
            .lock()
            .await
            .iter()
            .filter(|s| s.kind() == kind && s.target() == Some(peer))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SignalSink for MockSignalSink {
    async fn emit(&self, message: SignalMessage) -> Result<(), TransportError> {
        tracing::debug!("[MockSignalSink] {} to {:?}", message.kind(), message.target());

        self.signals.lock().await.push(message.clone());
        let _ = self.tx.send(message);
        Ok(())
    }
}
