use crate::config::LocalIdentity;
use crate::dedup::MessageDeduplicator;
use crate::join::{JoinCoordinator, MembershipService};
use crate::peer::PeerManager;
use crate::session::message_log::MessageLog;
use crate::session::session_event::SessionEvent;
use crate::transport::TransportEvent;
use meshroom_core::{ChatBody, ChatMessage, SignalMessage, UserId};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

pub(crate) enum LoopCommand {
    Stop(oneshot::Sender<()>),
}

/// The single thread of control of a session: transport events, offer timers
/// and facade commands, one at a time.
pub(crate) struct SessionLoop {
    pub(crate) identity: LocalIdentity,
    pub(crate) transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    pub(crate) commands: mpsc::UnboundedReceiver<LoopCommand>,
    pub(crate) coordinator: JoinCoordinator,
    pub(crate) dedup: MessageDeduplicator,
    pub(crate) log: MessageLog,
    pub(crate) peers: PeerManager,
    pub(crate) membership: Arc<dyn MembershipService>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
    pub(crate) participants: Arc<watch::Sender<Vec<UserId>>>,
}

impl SessionLoop {
    pub(crate) async fn run(mut self) {
        info!(
            "Session loop started for {} in room {}",
            self.identity.user_id, self.identity.room_id
        );

        loop {
            tokio::select! {
                event = self.transport_events.recv() => match event {
                    Some(event) => {
                        if !self.on_transport_event(event).await {
                            break;
                        }
                    }
                    None => {
                        warn!("Transport event stream ended");
                        break;
                    }
                },
                Some(peer) = self.coordinator.next_due() => {
                    self.coordinator.offer_due(&peer, &self.peers);
                }
                command = self.commands.recv() => match command {
                    Some(LoopCommand::Stop(done)) => {
                        let _ = done.send(());
                        break;
                    }
                    None => break,
                },
            }
        }

        info!("Session loop stopped for {}", self.identity.user_id);
    }

    /// `false` once the session cannot continue.
    async fn on_transport_event(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Broadcast(message) => self.on_broadcast(message).await,
            TransportEvent::Direct(signal) => self.on_direct(signal),
            TransportEvent::ConnectivityChanged(connected) => {
                info!("Signaling connectivity: {}", connected);
                let _ = self.events.send(SessionEvent::Connectivity(connected));
            }
            TransportEvent::InitialConnect => self.refresh_participants(),
            TransportEvent::Rejected(e) => {
                debug!("Transport rejected an inbound payload: {}", e);
            }
            TransportEvent::PermanentFailure { attempts, unsent } => {
                let reason = format!(
                    "signaling unreachable after {attempts} attempts, {unsent} messages undelivered"
                );
                error!("Session for {} is over: {}", self.identity.user_id, reason);
                let _ = self.events.send(SessionEvent::Fatal { reason });
                self.peers.shutdown().await;
                return false;
            }
        }
        true
    }

    async fn on_broadcast(&mut self, message: ChatMessage) {
        if message.room_id != self.identity.room_id {
            debug!("Ignoring broadcast for room {}", message.room_id);
            return;
        }

        if !self.dedup.admit(&message) {
            debug!(
                "Duplicate {} from {} at {}",
                message.kind(),
                message.sender_id,
                message.timestamp
            );
            return;
        }

        self.log.append(message.clone()).await;
        let _ = self.events.send(SessionEvent::Message(message.clone()));

        if message.sender_id == self.identity.user_id {
            return;
        }

        match message.body {
            ChatBody::Join => {
                self.coordinator.on_join(&message.sender_id, Some(message.timestamp));
            }
            ChatBody::Leave => {
                info!("{} left room {}", message.sender_id, message.room_id);
                self.peers.close_peer(&message.sender_id);
            }
            ChatBody::Chat { .. } | ChatBody::Image { .. } => {}
        }
    }

    fn on_direct(&mut self, signal: SignalMessage) {
        if let Some(target) = signal.target() {
            if *target != self.identity.user_id {
                warn!("{} addressed to {} arrived on our channel", signal.kind(), target);
                return;
            }
        }

        if signal.route().room_id != self.identity.room_id {
            debug!("Ignoring {} for room {}", signal.kind(), signal.route().room_id);
            return;
        }

        match signal {
            SignalMessage::Join { route } => {
                self.coordinator.on_join(&route.sender_id, None);
            }
            other => {
                debug!("{} from {}", other.kind(), other.sender());
                self.peers.dispatch(other);
            }
        }
    }

    fn refresh_participants(&self) {
        let membership = self.membership.clone();
        let room = self.identity.room_id.clone();
        let participants = self.participants.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            match membership.participants(&room).await {
                Ok(list) => {
                    info!("Room {} has {} participants", room, list.len());
                    participants.send_replace(list.clone());
                    let _ = events.send(SessionEvent::Participants(list));
                }
                Err(e) => warn!("Participant refresh for {} failed: {}", room, e),
            }
        });
    }
}
