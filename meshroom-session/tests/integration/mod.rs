//! Integration tests for meshroom-session.
//!
//! Tests are organized by component:
//! - `transport_tests` - connection, subscriptions, reconnection policy
//! - `peer_tests` - per-peer negotiation state machine
//! - `orchestrator_tests` - whole sessions talking through a relay

/// Polls `$cond` (which may `.await`) until it holds, failing the test after `$timeout`.
macro_rules! eventually {
    ($timeout:expr, $cond:expr) => {{
        let timeout = $timeout;
        let result = tokio::time::timeout(timeout, async {
            while !($cond) {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            result.is_ok(),
            "condition not met within {:?}: {}",
            timeout,
            stringify!($cond)
        );
    }};
}

pub mod orchestrator_tests;

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::Level;

use meshroom_core::{ChatMessage, IceCandidate, RoomId, SignalMessage, UserId};
use meshroom_relay::RelayService;
use meshroom_session::{
    Connector, LocalIdentity, LocalMedia, MediaTrack, PeerConfig, PeerContext, PeerManager,
    SessionConfig, SessionDeps, SessionEvent, SessionOrchestrator, StreamRegistry, TrackKind,
};

use crate::utils::{
    FakeLinkFactory, MockMediaSource, MockMembership, MockSignalSink, MockUpload, RelayConnector,
};

pub const ROOM: &str = "room-1";

/// Initialize tracing for tests (call once per test).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn room() -> RoomId {
    RoomId::from(ROOM)
}

pub fn identity(user: &str) -> LocalIdentity {
    LocalIdentity {
        room_id: room(),
        user_id: UserId::from(user),
        display_name: user.to_uppercase(),
    }
}

pub fn candidate(n: u32) -> IceCandidate {
    IceCandidate::new(format!("candidate:{n} 1 udp 2122260223 10.0.0.{n} 5000{n} typ host"))
}

/// A peer manager wired to fake links and a capturing signal sink.
pub struct PeerHarness {
    pub me: UserId,
    pub manager: PeerManager,
    pub links: FakeLinkFactory,
    pub sink: MockSignalSink,
    pub signals: mpsc::UnboundedReceiver<SignalMessage>,
    pub events: broadcast::Receiver<SessionEvent>,
}

pub fn create_peer_harness(user: &str) -> PeerHarness {
    create_peer_harness_with(user, PeerConfig::default())
}

pub fn create_peer_harness_with(user: &str, config: PeerConfig) -> PeerHarness {
    let (events_tx, events) = broadcast::channel(64);
    let (sink, signals) = MockSignalSink::new();
    let links = FakeLinkFactory::new();

    let local_media = Arc::new(LocalMedia::new(vec![
        Arc::new(MediaTrack::detached("mic", TrackKind::Audio)),
        Arc::new(MediaTrack::detached("cam", TrackKind::Video)),
    ]));

    let ctx = PeerContext::new(
        identity(user),
        Arc::new(links.clone()),
        local_media,
        Arc::new(sink.clone()),
        StreamRegistry::new(events_tx),
        config,
    );

    PeerHarness {
        me: UserId::from(user),
        manager: PeerManager::new(ctx),
        links,
        sink,
        signals,
        events,
    }
}

/// A running session plus handles on its mock collaborators.
pub struct TestSession {
    pub session: SessionOrchestrator,
    pub links: FakeLinkFactory,
    pub membership: MockMembership,
    pub uploads: MockUpload,
}

impl TestSession {
    pub fn user(&self) -> &UserId {
        &self.session.identity().user_id
    }

    /// Number of admitted log entries equal to `message`.
    pub async fn count(&self, message: &ChatMessage) -> usize {
        self.session
            .messages()
            .await
            .iter()
            .filter(|m| m.key() == message.key())
            .count()
    }
}

pub async fn start_session(service: &RelayService, user: &str) -> TestSession {
    start_session_with(RelayConnector::new(service.clone()), user, MockMembership::new()).await
}

pub async fn start_session_with(
    connector: Arc<dyn Connector>,
    user: &str,
    membership: MockMembership,
) -> TestSession {
    let links = FakeLinkFactory::new();
    let uploads = MockUpload::new();

    let config = SessionConfig::new(room(), UserId::from(user), user.to_uppercase());
    let deps = SessionDeps {
        connector,
        links: Arc::new(links.clone()),
        media: Arc::new(MockMediaSource::new()),
        membership: Arc::new(membership.clone()),
        uploads: Arc::new(uploads.clone()),
    };

    let session = SessionOrchestrator::start(config, deps)
        .await
        .expect("session should start");

    TestSession {
        session,
        links,
        membership,
        uploads,
    }
}
