use meshroom_core::{Channel, ProtocolError};
use thiserror::Error;

/// Why the relay refused a client frame. Reported back as `ServerFrame::Error`.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("cannot subscribe to {0}: it belongs to another user")]
    ForeignChannel(Channel),

    #[error("sender {claimed} does not match connection user {actual}")]
    SenderMismatch { claimed: String, actual: String },

    #[error("{destination} cannot carry a {kind} message")]
    WrongDestination { destination: String, kind: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
