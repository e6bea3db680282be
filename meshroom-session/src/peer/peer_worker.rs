use crate::peer::peer_command::PeerCommand;
use crate::peer::peer_context::PeerContext;
use crate::peer::peer_link::{LinkEvent, LinkEventKind, LinkState, SessionId};
use crate::peer::peer_session::PeerSession;
use crate::peer::peer_state::PeerState;
use meshroom_core::{IceCandidate, SessionDescription, SignalMessage, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Actor owning the session with a single remote peer.
pub(crate) struct PeerWorker {
    peer: UserId,
    generation: u64,
    ctx: Arc<PeerContext>,
    session: Option<PeerSession>,
    /// Candidates that arrived while no session existed.
    orphans: Vec<IceCandidate>,
    heal_budget: u32,
    commands: mpsc::UnboundedReceiver<PeerCommand>,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
}

impl PeerWorker {
    pub(crate) fn spawn(
        peer: UserId,
        generation: u64,
        ctx: Arc<PeerContext>,
    ) -> (mpsc::UnboundedSender<PeerCommand>, JoinHandle<()>) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();

        let worker = Self {
            heal_budget: ctx.config.heal_attempts,
            peer,
            generation,
            ctx,
            session: None,
            orphans: Vec::new(),
            commands,
            link_tx,
            link_rx,
        };

        (command_tx, tokio::spawn(worker.run()))
    }

    async fn run(mut self) {
        debug!("Peer worker started for {}", self.peer);

        loop {
            tokio::select! {
                biased;

                Some(event) = self.link_rx.recv() => self.on_link_event(event).await,
                command = self.commands.recv() => match command {
                    Some(PeerCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command).await,
                },
            }
        }

        self.discard("worker shutdown").await;
        self.ctx.record_state(&self.peer, self.generation, PeerState::Closed);
        debug!("Peer worker stopped for {}", self.peer);
    }

    async fn on_command(&mut self, command: PeerCommand) {
        match command {
            PeerCommand::CreateOffer => {
                self.orphans.clear();
                self.create_offer().await;
            }
            PeerCommand::RemoteOffer(offer) => self.handle_offer(offer).await,
            PeerCommand::RemoteAnswer(answer) => self.handle_answer(answer).await,
            PeerCommand::RemoteCandidate(candidate) => self.handle_candidate(candidate).await,
            PeerCommand::Barrier(done) => {
                let _ = done.send(());
            }
            PeerCommand::Shutdown => {}
        }
    }

    async fn create_offer(&mut self) {
        let reuse = matches!(&self.session, Some(s) if s.state() == PeerState::Connected);
        if reuse {
            debug!("Reusing connected session with {}", self.peer);
        } else {
            self.discard("replaced by a fresh offer").await;
            if !self.open_session().await {
                return;
            }
        }

        let Some(session) = self.session.as_mut() else { return };

        match session.link().create_offer().await {
            Ok(offer) => {
                session.set_local_offer(true);
                session.transition(PeerState::Negotiating);
                self.sync_state();

                info!("Sending OFFER to {}", self.peer);
                let signal = SignalMessage::offer(
                    self.ctx.identity.room_id.clone(),
                    self.ctx.identity.user_id.clone(),
                    self.peer.clone(),
                    offer,
                );
                self.emit(signal).await;
            }
            Err(e) => {
                warn!("Failed to create offer for {}: {}", self.peer, e);
                self.fail("offer generation failed").await;
            }
        }
    }

    async fn handle_offer(&mut self, offer: SessionDescription) {
        self.discard("replaced by remote offer").await;
        if !self.open_session().await {
            return;
        }

        let orphans = std::mem::take(&mut self.orphans);
        let Some(session) = self.session.as_mut() else { return };
        for candidate in orphans {
            session.buffer_candidate(candidate);
        }

        if let Err(e) = session.link().set_remote_description(offer).await {
            warn!("Malformed OFFER from {}: {}", self.peer, e);
            self.discard("malformed offer").await;
            self.heal().await;
            return;
        }
        session.mark_remote_set();

        let answer = match session.link().create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Failed to answer {}: {}", self.peer, e);
                self.discard("answer generation failed").await;
                self.heal().await;
                return;
            }
        };

        session.transition(PeerState::Negotiating);
        self.sync_state();

        info!("Sending ANSWER to {}", self.peer);
        let signal = SignalMessage::answer(
            self.ctx.identity.room_id.clone(),
            self.ctx.identity.user_id.clone(),
            self.peer.clone(),
            answer,
        );
        self.emit(signal).await;
        self.drain_candidates().await;
    }

    async fn handle_answer(&mut self, answer: SessionDescription) {
        let Some(session) = self.session.as_mut() else {
            warn!("ANSWER from {} without a session, dropping", self.peer);
            return;
        };

        if session.state() != PeerState::Negotiating || !session.has_local_offer() {
            warn!(
                "ANSWER from {} in state {} without a pending offer, restarting negotiation",
                self.peer,
                session.state()
            );
            self.discard("answer in wrong state").await;
            self.heal().await;
            return;
        }

        if let Err(e) = session.link().set_remote_description(answer).await {
            warn!("Failed to apply ANSWER from {}: {}", self.peer, e);
            self.discard("answer rejected").await;
            tokio::time::sleep(self.ctx.config.heal_delay).await;
            self.heal().await;
            return;
        }

        session.mark_remote_set();
        session.set_local_offer(false);
        if session.transition(PeerState::Connected) {
            self.heal_budget = self.ctx.config.heal_attempts;
        }
        self.sync_state();
        info!("Negotiation with {} complete", self.peer);

        self.drain_candidates().await;
    }

    async fn handle_candidate(&mut self, candidate: IceCandidate) {
        let Some(session) = self.session.as_mut() else {
            debug!("Holding ICE candidate from {} until a session exists", self.peer);
            self.orphans.push(candidate);
            return;
        };

        if !session.remote_set() {
            session.buffer_candidate(candidate);
            debug!(
                "Buffered ICE candidate from {} ({} pending)",
                self.peer,
                session.buffered_candidates()
            );
            return;
        }

        if let Err(e) = session.link().add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate from {}: {}", self.peer, e);
        }
    }

    async fn drain_candidates(&mut self) {
        let Some(session) = self.session.as_mut() else { return };

        let candidates = session.take_candidates();
        if candidates.is_empty() {
            return;
        }

        debug!("Applying {} buffered candidates from {}", candidates.len(), self.peer);
        for candidate in candidates {
            if let Err(e) = session.link().add_ice_candidate(candidate).await {
                warn!("Failed to add buffered ICE candidate from {}: {}", self.peer, e);
            }
        }
    }

    async fn on_link_event(&mut self, event: LinkEvent) {
        let Some(session) = self.session.as_mut() else {
            debug!("Link event for {} after session teardown", self.peer);
            return;
        };
        if session.id() != event.session {
            debug!("Ignoring event from stale session {} of {}", event.session, self.peer);
            return;
        }

        match event.kind {
            LinkEventKind::LocalCandidate(candidate) => {
                let signal = SignalMessage::ice_candidate(
                    self.ctx.identity.room_id.clone(),
                    self.ctx.identity.user_id.clone(),
                    self.peer.clone(),
                    candidate,
                );
                self.emit(signal).await;
            }
            LinkEventKind::RemoteTrack(track) => {
                if !track.is_enabled() {
                    debug!("Re-enabling remote track {} from {}", track.id(), self.peer);
                    track.set_enabled(true);
                }

                let stream = session.remote_stream().clone();
                stream.add_track(track);

                if !session.stream_published() && self.ctx.streams.publish(&self.peer, stream) {
                    session.mark_stream_published();
                    info!("Remote stream from {} is live", self.peer);
                }
            }
            LinkEventKind::StateChanged(LinkState::Connected) => {
                if session.state() == PeerState::Negotiating && !session.has_local_offer() {
                    session.transition(PeerState::Connected);
                    self.heal_budget = self.ctx.config.heal_attempts;
                    self.sync_state();
                }
            }
            LinkEventKind::StateChanged(state @ (LinkState::Failed | LinkState::Closed)) => {
                warn!("Link to {} reported {:?}, releasing session", self.peer, state);
                let terminal = match state {
                    LinkState::Failed => PeerState::Failed,
                    _ => PeerState::Closed,
                };
                session.transition(terminal);
                self.sync_state();
                self.discard("link lost").await;
            }
            LinkEventKind::StateChanged(state) => {
                debug!("Link to {} is {:?}", self.peer, state);
            }
        }
    }

    /// Creates a session with local tracks attached. `false` if the link could not be opened.
    async fn open_session(&mut self) -> bool {
        let id = SessionId::new();
        let link = match self.ctx.factory.open(&self.peer, id, self.link_tx.clone()).await {
            Ok(link) => link,
            Err(e) => {
                error!("Failed to open link to {}: {}", self.peer, e);
                self.ctx.record_state(&self.peer, self.generation, PeerState::Failed);
                return false;
            }
        };

        for track in self.ctx.local_media.tracks() {
            if let Err(e) = link.add_local_track(track).await {
                warn!("Track {} not attached for {}: {}", track.id(), self.peer, e);
            }
        }

        self.session = Some(PeerSession::new(id, self.peer.clone(), link));
        self.sync_state();
        true
    }

    /// Tears down the current session, if any, and retracts its stream.
    async fn discard(&mut self, reason: &str) {
        let Some(mut session) = self.session.take() else { return };

        if session.release().await {
            debug!("Released session {} with {}: {}", session.id(), self.peer, reason);
        }
        if session.stream_published() {
            self.ctx.streams.retract(&self.peer, session.remote_stream());
        }
    }

    async fn fail(&mut self, reason: &str) {
        self.discard(reason).await;
        self.ctx.record_state(&self.peer, self.generation, PeerState::Failed);
    }

    /// One fresh offer after a protocol violation, while the budget lasts.
    async fn heal(&mut self) {
        if self.heal_budget == 0 {
            error!("Giving up on {}: recovery budget exhausted", self.peer);
            self.ctx.record_state(&self.peer, self.generation, PeerState::Failed);
            return;
        }
        self.heal_budget -= 1;

        info!(
            "Re-offering to {} ({} recoveries left)",
            self.peer, self.heal_budget
        );
        self.orphans.clear();
        self.create_offer().await;
    }

    fn sync_state(&self) {
        if let Some(session) = &self.session {
            self.ctx.record_state(&self.peer, self.generation, session.state());
        }
    }

    async fn emit(&self, signal: SignalMessage) {
        let kind = signal.kind();
        if let Err(e) = self.ctx.signals.emit(signal).await {
            warn!("Failed to send {} to {}: {}", kind, self.peer, e);
        }
    }
}
