use crate::error::NegotiationError;
use crate::media::MediaTrack;
use async_trait::async_trait;
use meshroom_core::{IceCandidate, SessionDescription, UserId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of one session object. Completions carrying a stale id are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connectivity of the underlying media transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone)]
pub enum LinkEventKind {
    LocalCandidate(IceCandidate),
    RemoteTrack(Arc<MediaTrack>),
    StateChanged(LinkState),
}

/// Callback output of a link, tagged with the session it belongs to.
#[derive(Debug, Clone)]
pub struct LinkEvent {
    pub session: SessionId,
    pub kind: LinkEventKind,
}

/// The media transport behind a peer session.
#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn add_local_track(&self, track: &Arc<MediaTrack>) -> Result<(), NegotiationError>;

    /// Generates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    /// Generates an answer and installs it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    async fn close(&self);
}

#[async_trait]
pub trait PeerLinkFactory: Send + Sync {
    async fn open(
        &self,
        peer: &UserId,
        session: SessionId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>, NegotiationError>;
}
