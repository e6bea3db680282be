use crate::relay::relay_error::RelayError;
use dashmap::DashMap;
use meshroom_core::{
    Channel, ChatBody, ChatKind, ChatMessage, ClientFrame, Destination, ServerFrame, SignalMessage,
    UserId, unix_millis,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Identifies one socket of a user, so a stale socket cannot evict a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

struct Connection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerFrame>,
    subscriptions: HashSet<Channel>,
}

struct RelayInner {
    connections: DashMap<UserId, Connection>,
    next_id: AtomicU64,
}

/// Pub/sub router: `chat.*` fans out on room channels, `signal.*` goes to the
/// target's direct channel.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl Default for RelayService {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelayInner {
                connections: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers a socket for `user`, replacing any previous one.
    pub fn connect(&self, user: UserId) -> (ConnectionId, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));

        let previous = self.inner.connections.insert(
            user.clone(),
            Connection {
                id,
                tx,
                subscriptions: HashSet::new(),
            },
        );
        if previous.is_some() {
            info!("{} reconnected, previous socket replaced", user);
        }

        (id, rx)
    }

    pub fn disconnect(&self, user: &UserId, id: ConnectionId) {
        if self
            .inner
            .connections
            .remove_if(user, |_, conn| conn.id == id)
            .is_some()
        {
            debug!("{} disconnected", user);
        }
    }

    pub fn is_connected(&self, user: &UserId) -> bool {
        self.inner.connections.contains_key(user)
    }

    pub fn is_subscribed(&self, user: &UserId, channel: &Channel) -> bool {
        self.inner
            .connections
            .get(user)
            .is_some_and(|conn| conn.subscriptions.contains(channel))
    }

    pub fn handle_frame(&self, user: &UserId, frame: ClientFrame) -> Result<(), RelayError> {
        match frame {
            ClientFrame::Subscribe { channel } => self.subscribe(user, channel),
            ClientFrame::Unsubscribe { channel } => {
                if let Some(mut conn) = self.inner.connections.get_mut(user) {
                    conn.subscriptions.remove(&channel);
                }
                Ok(())
            }
            ClientFrame::Publish { destination, body } => match destination {
                Destination::ChatJoin | Destination::ChatSend | Destination::ChatLeave => {
                    self.route_chat(user, destination, body)
                }
                Destination::SignalOffer
                | Destination::SignalAnswer
                | Destination::SignalIceCandidate => self.route_signal(user, destination, body),
            },
        }
    }

    /// Sends an error frame to `user` only.
    pub fn reject(&self, user: &UserId, error: &RelayError) {
        warn!("Rejected frame from {}: {}", user, error);
        if let Some(conn) = self.inner.connections.get(user) {
            let _ = conn.tx.send(ServerFrame::Error {
                reason: error.to_string(),
            });
        }
    }

    fn subscribe(&self, user: &UserId, channel: Channel) -> Result<(), RelayError> {
        if let Channel::User(owner) = &channel {
            if owner != user {
                return Err(RelayError::ForeignChannel(channel));
            }
        }

        if let Some(mut conn) = self.inner.connections.get_mut(user) {
            debug!("{} subscribed to {}", user, channel);
            conn.subscriptions.insert(channel);
        }
        Ok(())
    }

    fn route_chat(&self, user: &UserId, destination: Destination, body: Value) -> Result<(), RelayError> {
        let mut message = ChatMessage::from_wire(body)?;
        self.check_sender(user, &message.sender_id)?;

        match destination {
            Destination::ChatJoin => message.body = ChatBody::Join,
            Destination::ChatLeave => message.body = ChatBody::Leave,
            _ => {
                if matches!(message.kind(), ChatKind::Join | ChatKind::Leave) {
                    return Err(RelayError::WrongDestination {
                        destination: destination.to_string(),
                        kind: message.kind().to_string(),
                    });
                }
            }
        }

        if message.timestamp == 0 {
            message.timestamp = unix_millis();
        }

        let channel = Channel::Room(message.room_id.clone());
        let delivered = self.broadcast(&channel, message.to_wire()?);
        debug!(
            "{} from {} fanned out to {} subscribers of {}",
            message.kind(),
            user,
            delivered,
            channel
        );
        Ok(())
    }

    fn route_signal(&self, user: &UserId, destination: Destination, body: Value) -> Result<(), RelayError> {
        let signal = SignalMessage::from_wire(body)?;
        self.check_sender(user, signal.sender())?;

        if signal.destination() != destination {
            return Err(RelayError::WrongDestination {
                destination: destination.to_string(),
                kind: signal.kind().to_string(),
            });
        }

        let Some(target) = signal.target() else {
            return Err(RelayError::WrongDestination {
                destination: destination.to_string(),
                kind: signal.kind().to_string(),
            });
        };

        let channel = Channel::User(target.clone());
        if self.broadcast(&channel, signal.to_wire()?) == 0 {
            // Nobody listens yet: the message is lost, exactly like a broker would.
            warn!(
                "{} from {} dropped: {} is not subscribed",
                signal.kind(),
                user,
                channel
            );
        }
        Ok(())
    }

    fn check_sender(&self, user: &UserId, claimed: &UserId) -> Result<(), RelayError> {
        if claimed != user {
            return Err(RelayError::SenderMismatch {
                claimed: claimed.to_string(),
                actual: user.to_string(),
            });
        }
        Ok(())
    }

    fn broadcast(&self, channel: &Channel, body: Value) -> usize {
        let mut delivered = 0;
        for conn in self.inner.connections.iter() {
            if !conn.subscriptions.contains(channel) {
                continue;
            }

            let frame = ServerFrame::Deliver {
                channel: channel.clone(),
                body: body.clone(),
            };
            match conn.tx.send(frame) {
                Ok(()) => delivered += 1,
                Err(_) => error!("Socket of {} is gone", conn.key()),
            }
        }
        delivered
    }
}
