use crate::config::LocalIdentity;
use crate::error::TransportError;
use crate::peer::SignalSink;
use crate::transport::connector::{Connector, Delivery, SignalingLink};
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::TransportEvent;
use async_trait::async_trait;
use meshroom_core::{Channel, ChatKind, ChatMessage, Destination, SignalMessage};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
struct Outbound {
    destination: Destination,
    body: Value,
}

enum PumpExit {
    Lost,
    Shutdown,
}

/// Cheap, cloneable front of the transport task.
#[derive(Clone)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    shutdown: Arc<watch::Sender<bool>>,
    connected: watch::Receiver<bool>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TransportHandle {
    /// Queues a publish. Delivered once a connection is up.
    pub fn send(&self, destination: Destination, body: Value) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound { destination, body })
            .map_err(|_| TransportError::Closed)
    }

    pub fn send_chat(&self, message: &ChatMessage) -> Result<(), TransportError> {
        let destination = match message.kind() {
            ChatKind::Join => Destination::ChatJoin,
            ChatKind::Leave => Destination::ChatLeave,
            ChatKind::Chat | ChatKind::Image => Destination::ChatSend,
        };
        self.send(destination, message.to_wire()?)
    }

    pub fn send_signal(&self, message: &SignalMessage) -> Result<(), TransportError> {
        self.send(message.destination(), message.to_wire()?)
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Flushes what is already queued (if connected), closes the link and waits
    /// for the task to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

#[async_trait]
impl SignalSink for TransportHandle {
    async fn emit(&self, message: SignalMessage) -> Result<(), TransportError> {
        self.send_signal(&message)
    }
}

/// Connection owner: connects, subscribes, pumps frames and reconnects.
pub struct SignalingTransport {
    connector: Arc<dyn Connector>,
    identity: LocalIdentity,
    config: TransportConfig,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    pending: VecDeque<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: watch::Sender<bool>,
    shutdown: watch::Receiver<bool>,
    announced: bool,
}

impl SignalingTransport {
    pub fn spawn(
        connector: Arc<dyn Connector>,
        identity: LocalIdentity,
        config: TransportConfig,
    ) -> (TransportHandle, mpsc::UnboundedReceiver<TransportEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let transport = Self {
            connector,
            identity,
            config,
            outbound_rx,
            pending: VecDeque::new(),
            events: events_tx,
            connected: connected_tx,
            shutdown: shutdown_rx,
            announced: false,
        };

        let task = tokio::spawn(transport.run());

        let handle = TransportHandle {
            outbound: outbound_tx,
            shutdown: Arc::new(shutdown_tx),
            connected: connected_rx,
            task: Arc::new(Mutex::new(Some(task))),
        };

        (handle, events_rx)
    }

    async fn run(mut self) {
        let mut shutdown = self.shutdown.clone();
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let attempt = tokio::select! {
                res = self.establish() => res,
                _ = shutdown.changed() => break,
            };

            match attempt {
                Ok(mut link) => {
                    failures = 0;
                    info!(
                        "Signaling connected for {} in room {}",
                        self.identity.user_id, self.identity.room_id
                    );
                    self.set_connected(true);

                    if !self.announced {
                        self.announced = true;
                        self.emit(TransportEvent::InitialConnect);
                    }

                    let exit = self.pump(&mut link, &mut shutdown).await;
                    self.set_connected(false);

                    if let PumpExit::Shutdown = exit {
                        self.flush(&mut link).await;
                        link.close().await;
                        break;
                    }

                    warn!("Signaling connection lost for {}", self.identity.user_id);
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Signaling attempt {}/{} failed: {}",
                        failures, self.config.max_attempts, e
                    );

                    if failures >= self.config.max_attempts {
                        let unsent = self.pending.len() + self.outbound_rx.len();
                        error!(
                            "Signaling gave up after {} consecutive failures with {} messages unsent",
                            failures, unsent
                        );
                        self.emit(TransportEvent::PermanentFailure {
                            attempts: failures,
                            unsent,
                        });
                        break;
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.backoff) => {}
                _ = shutdown.changed() => break,
            }
        }

        if !self.pending.is_empty() || !self.outbound_rx.is_empty() {
            warn!(
                "Dropping {} unsent messages on transport stop",
                self.pending.len() + self.outbound_rx.len()
            );
        }
        info!("Signaling transport stopped for {}", self.identity.user_id);
    }

    /// Connect and subscribe to both channels. Either subscription failing
    /// closes the link and fails the whole attempt.
    async fn establish(&self) -> Result<Box<dyn SignalingLink>, TransportError> {
        let mut link = self.connector.connect(&self.identity.user_id).await?;

        let channels = [
            Channel::Room(self.identity.room_id.clone()),
            Channel::User(self.identity.user_id.clone()),
        ];

        for channel in &channels {
            if let Err(e) = link.subscribe(channel).await {
                link.close().await;
                return Err(e);
            }
            debug!("Subscribed to {}", channel);
        }

        Ok(link)
    }

    async fn pump(
        &mut self,
        link: &mut Box<dyn SignalingLink>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PumpExit {
        // Publishes that failed on the previous connection go first.
        while let Some(out) = self.pending.pop_front() {
            if let Err(e) = link.publish(out.destination, out.body.clone()).await {
                warn!("Retrying publish to {} failed: {}", out.destination, e);
                self.pending.push_front(out);
                return PumpExit::Lost;
            }
        }

        loop {
            tokio::select! {
                frame = link.next_frame() => match frame {
                    Some(delivery) => self.deliver(delivery),
                    None => return PumpExit::Lost,
                },
                Some(out) = self.outbound_rx.recv() => {
                    if let Err(e) = link.publish(out.destination, out.body.clone()).await {
                        warn!("Publish to {} failed, keeping it for the next connection: {}", out.destination, e);
                        self.pending.push_back(out);
                        return PumpExit::Lost;
                    }
                }
                _ = shutdown.changed() => return PumpExit::Shutdown,
            }
        }
    }

    async fn flush(&mut self, link: &mut Box<dyn SignalingLink>) {
        self.outbound_rx.close();
        while let Ok(out) = self.outbound_rx.try_recv() {
            self.pending.push_back(out);
        }

        while let Some(out) = self.pending.pop_front() {
            if let Err(e) = link.publish(out.destination, out.body).await {
                warn!("Flush on shutdown failed: {}", e);
                break;
            }
        }
    }

    fn deliver(&self, delivery: Delivery) {
        let decoded = match &delivery.channel {
            Channel::Room(_) => ChatMessage::from_wire(delivery.body).map(TransportEvent::Broadcast),
            Channel::User(_) => SignalMessage::from_wire(delivery.body).map(TransportEvent::Direct),
        };

        match decoded {
            Ok(event) => self.emit(event),
            Err(e) => {
                warn!("Dropping invalid payload on {}: {}", delivery.channel, e);
                self.emit(TransportEvent::Rejected(e));
            }
        }
    }

    fn set_connected(&self, connected: bool) {
        self.connected.send_replace(connected);
        self.emit(TransportEvent::ConnectivityChanged(connected));
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}
