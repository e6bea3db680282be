use crate::media::media_stream::MediaStream;
use crate::session::SessionEvent;
use dashmap::DashMap;
use meshroom_core::UserId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Live map of peer id to remote stream, announcing changes on the event bus.
#[derive(Clone)]
pub struct StreamRegistry {
    streams: Arc<DashMap<UserId, Arc<MediaStream>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl StreamRegistry {
    pub fn new(events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            streams: Arc::new(DashMap::new()),
            events,
        }
    }

    /// Exposes `stream` for `peer`. Refused while the stream holds no live track.
    pub fn publish(&self, peer: &UserId, stream: Arc<MediaStream>) -> bool {
        if !stream.has_live_track() {
            return false;
        }

        self.streams.insert(peer.clone(), stream.clone());
        debug!("Remote stream {} published for {}", stream.id(), peer);
        let _ = self.events.send(SessionEvent::StreamAdded {
            peer: peer.clone(),
            stream,
        });
        true
    }

    /// Drops the stream of `peer`, announcing the removal if one was exposed.
    pub fn remove(&self, peer: &UserId) -> bool {
        let Some((_, stream)) = self.streams.remove(peer) else {
            return false;
        };

        stream.end();
        debug!("Remote stream {} removed for {}", stream.id(), peer);
        let _ = self.events.send(SessionEvent::StreamRemoved { peer: peer.clone() });
        true
    }

    /// Like [`remove`](Self::remove), but only if `stream` is still the one exposed.
    pub fn retract(&self, peer: &UserId, stream: &Arc<MediaStream>) -> bool {
        let removed = self
            .streams
            .remove_if(peer, |_, current| Arc::ptr_eq(current, stream))
            .is_some();

        stream.end();
        if removed {
            debug!("Remote stream {} retracted for {}", stream.id(), peer);
            let _ = self.events.send(SessionEvent::StreamRemoved { peer: peer.clone() });
        }
        removed
    }

    pub fn get(&self, peer: &UserId) -> Option<Arc<MediaStream>> {
        self.streams.get(peer).map(|entry| entry.value().clone())
    }

    pub fn snapshot(&self) -> HashMap<UserId, Arc<MediaStream>> {
        self.streams
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
