use crate::config::LocalIdentity;
use crate::error::{MediaError, SessionError};
use crate::join::join_config::JoinConfig;
use crate::join::membership::MembershipService;
use crate::media::{LocalMedia, MediaSource};
use crate::peer::PeerManager;
use crate::transport::TransportHandle;
use meshroom_core::{ChatMessage, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Sequences media capture and room join, and turns peer JOINs into offers.
pub struct JoinCoordinator {
    identity: LocalIdentity,
    config: JoinConfig,
    last_join: HashMap<UserId, Instant>,
    pending: HashSet<UserId>,
    /// Timestamp of our own JOIN, once sent.
    joined_at: Option<u64>,
    due_tx: mpsc::UnboundedSender<UserId>,
    due_rx: mpsc::UnboundedReceiver<UserId>,
}

impl JoinCoordinator {
    pub fn new(identity: LocalIdentity, config: JoinConfig) -> Self {
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        Self {
            identity,
            config,
            last_join: HashMap::new(),
            pending: HashSet::new(),
            joined_at: None,
            due_tx,
            due_rx,
        }
    }

    /// Local capture. Must succeed before anything touches the network.
    pub async fn acquire_media(source: &dyn MediaSource) -> Result<Arc<LocalMedia>, MediaError> {
        match source.capture().await {
            Ok(media) => {
                info!("Captured {} local tracks", media.tracks().len());
                Ok(Arc::new(media))
            }
            Err(e) => {
                error!("Local media capture failed: {}", e);
                Err(e)
            }
        }
    }

    /// Membership handshake, then our JOIN on the room channel.
    pub async fn join_room(
        &mut self,
        membership: &dyn MembershipService,
        transport: &TransportHandle,
    ) -> Result<(), SessionError> {
        let LocalIdentity {
            room_id,
            user_id,
            display_name,
        } = &self.identity;

        membership.join_room(room_id, user_id).await?;
        info!("{} joined room {}", user_id, room_id);

        let join = ChatMessage::join(room_id.clone(), user_id.clone(), display_name.clone());
        transport.send_chat(&join)?;
        self.joined_at = Some(join.timestamp);
        Ok(())
    }

    /// Reacts to a JOIN from `peer` sent at `joined_at` (when known).
    /// `true` if an offer was scheduled.
    pub fn on_join(&mut self, peer: &UserId, joined_at: Option<u64>) -> bool {
        if *peer == self.identity.user_id {
            return false;
        }

        if let Some(theirs) = joined_at {
            if !self.is_senior_to(peer, theirs) {
                debug!("{} joined before us, waiting for its offer", peer);
                return false;
            }
        }

        let now = Instant::now();
        if let Some(last) = self.last_join.get(peer) {
            if now.duration_since(*last) < self.config.debounce {
                debug!("Debounced repeated JOIN from {}", peer);
                return false;
            }
        }

        if self.pending.contains(peer) {
            debug!("Offer to {} already pending", peer);
            return false;
        }

        self.last_join.insert(peer.clone(), now);
        self.pending.insert(peer.clone());

        // Gives the newcomer time to subscribe to its direct channel.
        let due_tx = self.due_tx.clone();
        let delay = self.config.offer_delay;
        let peer = peer.clone();
        debug!("Offer to {} scheduled in {:?}", peer, delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = due_tx.send(peer);
        });

        true
    }

    /// Only the member that joined first offers, so two members that see each
    /// other's JOIN never both initiate. Equal timestamps fall back to the ids.
    fn is_senior_to(&self, peer: &UserId, theirs: u64) -> bool {
        match self.joined_at {
            Some(ours) => (ours, &self.identity.user_id) < (theirs, peer),
            None => true,
        }
    }

    /// Next peer whose offer delay has elapsed.
    pub async fn next_due(&mut self) -> Option<UserId> {
        self.due_rx.recv().await
    }

    pub fn offer_due(&mut self, peer: &UserId, peers: &PeerManager) {
        if !self.pending.contains(peer) {
            return;
        }
        peers.create_offer(peer);
        self.pending.remove(peer);
    }

    pub fn is_pending(&self, peer: &UserId) -> bool {
        self.pending.contains(peer)
    }
}
