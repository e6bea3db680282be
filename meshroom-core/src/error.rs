use thiserror::Error;

/// Rejection reasons for payloads crossing the signaling boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
