use crate::media::MediaStream;
use crate::peer::peer_link::{PeerLink, SessionId};
use crate::peer::peer_state::PeerState;
use meshroom_core::{IceCandidate, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// One negotiation attempt with one peer. Replaced, never resumed.
pub struct PeerSession {
    id: SessionId,
    peer: UserId,
    link: Arc<dyn PeerLink>,
    state: PeerState,
    has_local_offer: bool,
    remote_set: bool,
    pending_candidates: Vec<IceCandidate>,
    remote_stream: Arc<MediaStream>,
    stream_published: bool,
    released: bool,
}

impl PeerSession {
    pub fn new(id: SessionId, peer: UserId, link: Arc<dyn PeerLink>) -> Self {
        let remote_stream = Arc::new(MediaStream::new(format!("{peer}-{id}")));
        Self {
            id,
            peer,
            link,
            state: PeerState::Idle,
            has_local_offer: false,
            remote_set: false,
            pending_candidates: Vec::new(),
            remote_stream,
            stream_published: false,
            released: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn link(&self) -> &Arc<dyn PeerLink> {
        &self.link
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Applies `next` if the state machine allows it.
    pub fn transition(&mut self, next: PeerState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                "Refusing {} -> {} for session {} with {}",
                self.state, next, self.id, self.peer
            );
            return false;
        }
        debug!("Session {} with {}: {} -> {}", self.id, self.peer, self.state, next);
        self.state = next;
        true
    }

    pub fn has_local_offer(&self) -> bool {
        self.has_local_offer
    }

    pub fn set_local_offer(&mut self, pending: bool) {
        self.has_local_offer = pending;
    }

    pub fn remote_set(&self) -> bool {
        self.remote_set
    }

    pub fn mark_remote_set(&mut self) {
        self.remote_set = true;
    }

    pub fn buffer_candidate(&mut self, candidate: IceCandidate) {
        self.pending_candidates.push(candidate);
    }

    pub fn buffered_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Hands out the buffered candidates in arrival order and clears the buffer.
    pub fn take_candidates(&mut self) -> Vec<IceCandidate> {
        std::mem::take(&mut self.pending_candidates)
    }

    pub fn remote_stream(&self) -> &Arc<MediaStream> {
        &self.remote_stream
    }

    pub fn stream_published(&self) -> bool {
        self.stream_published
    }

    pub fn mark_stream_published(&mut self) {
        self.stream_published = true;
    }

    /// Detaches local tracks and closes the link. Only the first call does anything.
    pub async fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        if !self.pending_candidates.is_empty() {
            debug!(
                "Dropping {} buffered candidates of session {}",
                self.pending_candidates.len(),
                self.id
            );
            self.pending_candidates.clear();
        }

        self.link.close().await;
        if !self.state.is_terminal() {
            self.state = PeerState::Closed;
        }
        true
    }
}
