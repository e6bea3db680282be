use crate::config::{LocalIdentity, SessionConfig};
use crate::dedup::MessageDeduplicator;
use crate::error::SessionResult;
use crate::join::{JoinCoordinator, MembershipService};
use crate::media::{LocalMedia, MediaSource, MediaStream, StreamRegistry};
use crate::peer::{PeerContext, PeerLinkFactory, PeerManager, PeerState};
use crate::session::message_log::MessageLog;
use crate::session::session_event::SessionEvent;
use crate::session::session_loop::{LoopCommand, SessionLoop};
use crate::session::upload::UploadService;
use crate::transport::{Connector, SignalingTransport, TransportHandle};
use bytes::Bytes;
use meshroom_core::{ChatMessage, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// External collaborators a session is built from.
pub struct SessionDeps {
    pub connector: Arc<dyn Connector>,
    pub links: Arc<dyn PeerLinkFactory>,
    pub media: Arc<dyn MediaSource>,
    pub membership: Arc<dyn MembershipService>,
    pub uploads: Arc<dyn UploadService>,
}

/// A joined room: chat log, remote streams and the outbound actions.
pub struct SessionOrchestrator {
    identity: LocalIdentity,
    transport: TransportHandle,
    peers: PeerManager,
    streams: StreamRegistry,
    local_media: Arc<LocalMedia>,
    log: MessageLog,
    events: broadcast::Sender<SessionEvent>,
    participants: watch::Receiver<Vec<UserId>>,
    uploads: Arc<dyn UploadService>,
    commands: mpsc::UnboundedSender<LoopCommand>,
    task: Mutex<Option<JoinHandle<()>>>,
    left: AtomicBool,
}

impl SessionOrchestrator {
    /// Captures media, connects, joins the room and starts the event loop.
    /// A capture failure returns before any network activity.
    pub async fn start(config: SessionConfig, deps: SessionDeps) -> SessionResult<Self> {
        config.validate()?;
        let identity = config.identity();

        let local_media = JoinCoordinator::acquire_media(deps.media.as_ref()).await?;

        let (events, _) = broadcast::channel(config.event_capacity);
        let (transport, transport_events) = SignalingTransport::spawn(
            deps.connector.clone(),
            identity.clone(),
            config.transport.clone(),
        );

        let streams = StreamRegistry::new(events.clone());
        let peers = PeerManager::new(PeerContext::new(
            identity.clone(),
            deps.links.clone(),
            local_media.clone(),
            Arc::new(transport.clone()),
            streams.clone(),
            config.peer.clone(),
        ));

        let mut coordinator = JoinCoordinator::new(identity.clone(), config.join.clone());
        if let Err(e) = coordinator
            .join_room(deps.membership.as_ref(), &transport)
            .await
        {
            error!("Joining room {} failed: {}", identity.room_id, e);
            peers.shutdown().await;
            transport.shutdown().await;
            local_media.stop();
            return Err(e);
        }

        let (participants_tx, participants_rx) = watch::channel(Vec::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let log = MessageLog::new();

        let session_loop = SessionLoop {
            identity: identity.clone(),
            transport_events,
            commands: command_rx,
            coordinator,
            dedup: MessageDeduplicator::new(),
            log: log.clone(),
            peers: peers.clone(),
            membership: deps.membership.clone(),
            events: events.clone(),
            participants: Arc::new(participants_tx),
        };
        let task = tokio::spawn(session_loop.run());

        info!("Session started for {} in room {}", identity.user_id, identity.room_id);

        Ok(Self {
            identity,
            transport,
            peers,
            streams,
            local_media,
            log,
            events,
            participants: participants_rx,
            uploads: deps.uploads,
            commands: command_tx,
            task: Mutex::new(Some(task)),
            left: AtomicBool::new(false),
        })
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// Publishes a CHAT message. It shows up in [`messages`](Self::messages)
    /// when the room broadcast echoes it back.
    pub fn send_chat(&self, content: impl Into<String>) -> SessionResult<ChatMessage> {
        let message = ChatMessage::chat(
            self.identity.room_id.clone(),
            self.identity.user_id.clone(),
            self.identity.display_name.clone(),
            content,
        );
        self.transport.send_chat(&message)?;
        Ok(message)
    }

    /// Uploads `data`, then publishes an IMAGE message pointing at it.
    pub async fn send_image(&self, file_name: &str, data: Bytes) -> SessionResult<ChatMessage> {
        let url = self
            .uploads
            .upload(&self.identity.room_id, &self.identity.user_id, file_name, data)
            .await?;

        let message = ChatMessage::image(
            self.identity.room_id.clone(),
            self.identity.user_id.clone(),
            self.identity.display_name.clone(),
            url,
        );
        self.transport.send_chat(&message)?;
        Ok(message)
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.log.snapshot().await
    }

    pub fn remote_streams(&self) -> HashMap<UserId, Arc<MediaStream>> {
        self.streams.snapshot()
    }

    pub fn local_media(&self) -> Arc<LocalMedia> {
        self.local_media.clone()
    }

    pub fn participants(&self) -> Vec<UserId> {
        self.participants.borrow().clone()
    }

    pub fn peer_state(&self, peer: &UserId) -> Option<PeerState> {
        self.peers.state(peer)
    }

    pub fn peers(&self) -> &PeerManager {
        &self.peers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Announces LEAVE, stops the loop, closes every peer session and the
    /// transport, then releases local media. Safe to call more than once.
    pub async fn leave(&self) -> SessionResult<()> {
        if self.left.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let leave = ChatMessage::leave(
            self.identity.room_id.clone(),
            self.identity.user_id.clone(),
            self.identity.display_name.clone(),
        );
        if let Err(e) = self.transport.send_chat(&leave) {
            warn!("LEAVE for {} not sent: {}", self.identity.room_id, e);
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(LoopCommand::Stop(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }

        self.peers.shutdown().await;
        self.transport.shutdown().await;
        self.local_media.stop();

        info!("{} left room {}", self.identity.user_id, self.identity.room_id);
        Ok(())
    }
}
