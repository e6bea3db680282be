use async_trait::async_trait;
use meshroom_core::{IceCandidate, SdpKind, SessionDescription, UserId};
use meshroom_session::{
    LinkEvent, LinkEventKind, LinkState, MediaTrack, NegotiationError, PeerLink, PeerLinkFactory,
    SessionId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Everything a test may want to assert a link was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    AddTrack(String),
    CreateOffer,
    CreateAnswer,
    SetRemote(SdpKind),
    AddCandidate(String),
    Close,
}

/// In-memory PeerLink. Remote descriptions whose SDP starts with `bad` are rejected,
/// and answering a remote offer whose SDP starts with `unanswerable` fails.
pub struct FakeLink {
    pub peer: UserId,
    pub session: SessionId,
    events: mpsc::UnboundedSender<LinkEvent>,
    calls: Mutex<Vec<LinkCall>>,
    remote_sdp: Mutex<Option<String>>,
    closes: AtomicUsize,
}

impl FakeLink {
    pub fn calls(&self) -> Vec<LinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                LinkCall::AddCandidate(candidate) => Some(candidate),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Pretends the underlying transport fired a callback.
    pub fn emit(&self, kind: LinkEventKind) {
        let _ = self.events.send(LinkEvent {
            session: self.session,
            kind,
        });
    }

    pub fn emit_state(&self, state: LinkState) {
        self.emit(LinkEventKind::StateChanged(state));
    }

    pub fn emit_track(&self, track: Arc<MediaTrack>) {
        self.emit(LinkEventKind::RemoteTrack(track));
    }

    fn record(&self, call: LinkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerLink for FakeLink {
    async fn add_local_track(&self, track: &Arc<MediaTrack>) -> Result<(), NegotiationError> {
        self.record(LinkCall::AddTrack(track.id().to_owned()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        self.record(LinkCall::CreateOffer);
        Ok(SessionDescription::offer(format!("offer-{}", self.session)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        self.record(LinkCall::CreateAnswer);
        let unanswerable = self
            .remote_sdp
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|sdp| sdp.starts_with("unanswerable"));
        if unanswerable {
            return Err(anyhow::anyhow!("no compatible codecs").into());
        }
        Ok(SessionDescription::answer(format!("answer-{}", self.session)))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if description.sdp.starts_with("bad") {
            return Err(anyhow::anyhow!("unparseable sdp").into());
        }
        self.record(LinkCall::SetRemote(description.kind));
        *self.remote_sdp.lock().unwrap() = Some(description.sdp);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.record(LinkCall::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn close(&self) {
        self.record(LinkCall::Close);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out FakeLinks and remembers them per peer.
#[derive(Clone, Default)]
pub struct FakeLinkFactory {
    links: Arc<Mutex<Vec<Arc<FakeLink>>>>,
}

impl FakeLinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links_for(&self, peer: &UserId) -> Vec<Arc<FakeLink>> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| &l.peer == peer)
            .cloned()
            .collect()
    }

    pub fn latest(&self, peer: &UserId) -> Option<Arc<FakeLink>> {
        self.links_for(peer).pop()
    }

    pub fn opened(&self, peer: &UserId) -> usize {
        self.links_for(peer).len()
    }
}

#[async_trait]
impl PeerLinkFactory for FakeLinkFactory {
    async fn open(
        &self,
        peer: &UserId,
        session: SessionId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>, NegotiationError> {
        let link = Arc::new(FakeLink {
            peer: peer.clone(),
            session,
            events,
            calls: Mutex::new(Vec::new()),
            remote_sdp: Mutex::new(None),
            closes: AtomicUsize::new(0),
        });
        self.links.lock().unwrap().push(link.clone());
        Ok(link)
    }
}
