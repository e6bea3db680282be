use meshroom_core::{ChatMessage, ProtocolError, SignalMessage};

/// What the transport reports to the session loop.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Chat event on the room broadcast channel.
    Broadcast(ChatMessage),

    /// Negotiation message on our direct channel.
    Direct(SignalMessage),

    ConnectivityChanged(bool),

    /// First successful connection since start. Never repeated on reconnects.
    InitialConnect,

    /// An inbound payload failed validation and was dropped.
    Rejected(ProtocolError),

    /// Reconnect budget exhausted. The transport has stopped and `unsent`
    /// queued messages were never delivered.
    PermanentFailure { attempts: u32, unsent: usize },
}
