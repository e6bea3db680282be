use crate::peer::peer_command::PeerCommand;
use crate::peer::peer_context::PeerContext;
use crate::peer::peer_state::PeerState;
use crate::peer::peer_worker::PeerWorker;
use dashmap::DashMap;
use meshroom_core::{IceCandidate, SessionDescription, SignalMessage, UserId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct WorkerHandle {
    commands: mpsc::UnboundedSender<PeerCommand>,
    task: JoinHandle<()>,
}

/// Owns one worker per remote peer. Calls return immediately; each peer's
/// commands are executed in order on its own task.
#[derive(Clone)]
pub struct PeerManager {
    ctx: Arc<PeerContext>,
    workers: Arc<DashMap<UserId, WorkerHandle>>,
    /// Workers told to stop by `close_peer` that may still be releasing.
    retiring: Arc<DashMap<UserId, Vec<JoinHandle<()>>>>,
    next_generation: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl PeerManager {
    pub fn new(ctx: PeerContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            workers: Arc::new(DashMap::new()),
            retiring: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn context(&self) -> &Arc<PeerContext> {
        &self.ctx
    }

    pub fn create_offer(&self, peer: &UserId) {
        self.send(peer, PeerCommand::CreateOffer);
    }

    pub fn handle_offer(&self, offer: SessionDescription, from: &UserId) {
        self.send(from, PeerCommand::RemoteOffer(offer));
    }

    pub fn handle_answer(&self, answer: SessionDescription, from: &UserId) {
        self.send(from, PeerCommand::RemoteAnswer(answer));
    }

    pub fn handle_ice_candidate(&self, candidate: IceCandidate, from: &UserId) {
        self.send(from, PeerCommand::RemoteCandidate(candidate));
    }

    /// Releases the session with `peer` and retires its worker. Unknown
    /// peers are ignored. A later command for `peer` starts a fresh worker.
    pub fn close_peer(&self, peer: &UserId) {
        let Some((_, worker)) = self.workers.remove(peer) else {
            debug!("No session with {} to close", peer);
            return;
        };
        let _ = worker.commands.send(PeerCommand::Shutdown);

        let mut retiring = self.retiring.entry(peer.clone()).or_default();
        retiring.retain(|task| !task.is_finished());
        retiring.push(worker.task);
    }

    /// Routes a direct negotiation message to the matching handler.
    pub fn dispatch(&self, message: SignalMessage) {
        match message {
            SignalMessage::Offer { route, description } => {
                self.handle_offer(description, &route.sender_id)
            }
            SignalMessage::Answer { route, description } => {
                self.handle_answer(description, &route.sender_id)
            }
            SignalMessage::IceCandidate { route, candidate } => {
                self.handle_ice_candidate(candidate, &route.sender_id)
            }
            SignalMessage::Join { route } => {
                debug!("JOIN from {} is not a negotiation message", route.sender_id)
            }
        }
    }

    pub fn state(&self, peer: &UserId) -> Option<PeerState> {
        self.ctx.state(peer)
    }

    pub fn peers(&self) -> Vec<UserId> {
        self.workers.iter().map(|w| w.key().clone()).collect()
    }

    /// Resolves once `peer` has processed everything queued before this call.
    pub async fn settle(&self, peer: &UserId) {
        if let Some((_, retired)) = self.retiring.remove(peer) {
            for task in retired {
                let _ = task.await;
            }
        }

        let (done_tx, done_rx) = oneshot::channel();
        let sent = match self.workers.get(peer) {
            Some(worker) => worker.commands.send(PeerCommand::Barrier(done_tx)).is_ok(),
            None => false,
        };
        if sent {
            let _ = done_rx.await;
        }
    }

    /// Stops every worker, releasing all sessions. Later calls are ignored.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let peers = self.peers();
        info!("Closing {} peer sessions", peers.len());

        for peer in peers {
            if let Some((_, worker)) = self.workers.remove(&peer) {
                let _ = worker.commands.send(PeerCommand::Shutdown);
                let _ = worker.task.await;
            }
        }

        let retired: Vec<UserId> = self.retiring.iter().map(|r| r.key().clone()).collect();
        for peer in retired {
            if let Some((_, tasks)) = self.retiring.remove(&peer) {
                for task in tasks {
                    let _ = task.await;
                }
            }
        }
    }

    fn send(&self, peer: &UserId, command: PeerCommand) {
        if *peer == self.ctx.identity.user_id {
            debug!("Ignoring {:?} addressed to ourselves", command);
            return;
        }
        if self.closed.load(Ordering::Acquire) {
            debug!("Peer manager closed, dropping {:?} for {}", command, peer);
            return;
        }

        let worker = self.workers.entry(peer.clone()).or_insert_with(|| {
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            let (commands, task) = PeerWorker::spawn(peer.clone(), generation, self.ctx.clone());
            WorkerHandle { commands, task }
        });

        if worker.commands.send(command).is_err() {
            warn!("Worker for {} has stopped", peer);
        }
    }
}
