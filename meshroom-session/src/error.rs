use meshroom_core::{Channel, ProtocolError};
use thiserror::Error;

/// Failures of the signaling connection itself.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid signaling endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("failed to connect to signaling server: {0}")]
    Connect(String),

    #[error("subscription to {channel} failed: {reason}")]
    Subscribe { channel: Channel, reason: String },

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("signaling transport is closed")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Failures while building or negotiating a peer media session.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("track {0} cannot be sent over this link")]
    UnsupportedTrack(String),

    #[error("peer link is closed")]
    LinkClosed,

    #[error(transparent)]
    Rtc(#[from] anyhow::Error),
}

/// Local capture errors. Fatal to session start.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media capture denied: {0}")]
    Denied(String),

    #[error("media device unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
#[error("membership service error: {0}")]
pub struct MembershipError(pub String);

#[derive(Debug, Error)]
#[error("upload failed: {0}")]
pub struct UploadError(pub String);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("session has ended")]
    Closed,
}

pub type SessionResult<T> = Result<T, SessionError>;
