use crate::config::LocalIdentity;
use crate::media::{LocalMedia, StreamRegistry};
use crate::peer::peer_config::PeerConfig;
use crate::peer::peer_link::PeerLinkFactory;
use crate::peer::peer_state::PeerState;
use crate::peer::signal_sink::SignalSink;
use dashmap::DashMap;
use meshroom_core::UserId;
use std::sync::Arc;

/// State shared by every peer worker of one session.
pub struct PeerContext {
    pub identity: LocalIdentity,
    pub factory: Arc<dyn PeerLinkFactory>,
    pub local_media: Arc<LocalMedia>,
    pub signals: Arc<dyn SignalSink>,
    pub streams: StreamRegistry,
    pub config: PeerConfig,
    /// Last state per peer, tagged with the generation of the worker that wrote it.
    states: DashMap<UserId, (u64, PeerState)>,
}

impl PeerContext {
    pub fn new(
        identity: LocalIdentity,
        factory: Arc<dyn PeerLinkFactory>,
        local_media: Arc<LocalMedia>,
        signals: Arc<dyn SignalSink>,
        streams: StreamRegistry,
        config: PeerConfig,
    ) -> Self {
        Self {
            identity,
            factory,
            local_media,
            signals,
            streams,
            config,
            states: DashMap::new(),
        }
    }

    pub fn state(&self, peer: &UserId) -> Option<PeerState> {
        self.states.get(peer).map(|s| s.1)
    }

    /// A retired worker finishing late never overwrites its successor.
    pub(crate) fn record_state(&self, peer: &UserId, generation: u64, state: PeerState) {
        let mut entry = self
            .states
            .entry(peer.clone())
            .or_insert((generation, state));
        if entry.0 <= generation {
            *entry = (generation, state);
        }
    }
}
