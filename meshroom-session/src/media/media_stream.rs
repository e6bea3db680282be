use crate::media::media_track::{MediaTrack, TrackKind};
use dashmap::DashMap;
use std::sync::Arc;

/// A set of tracks shared with the UI by `Arc`.
#[derive(Debug)]
pub struct MediaStream {
    id: String,
    tracks: DashMap<String, Arc<MediaTrack>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: DashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `false` when a track with the same id was already present.
    pub fn add_track(&self, track: Arc<MediaTrack>) -> bool {
        self.tracks
            .insert(track.id().to_owned(), track)
            .is_none()
    }

    pub fn tracks(&self) -> Vec<Arc<MediaTrack>> {
        self.tracks.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn audio_track(&self) -> Option<Arc<MediaTrack>> {
        self.first_of(TrackKind::Audio)
    }

    pub fn video_track(&self) -> Option<Arc<MediaTrack>> {
        self.first_of(TrackKind::Video)
    }

    pub fn live_track_count(&self) -> usize {
        self.tracks.iter().filter(|entry| entry.value().is_live()).count()
    }

    pub fn has_live_track(&self) -> bool {
        self.tracks.iter().any(|entry| entry.value().is_live())
    }

    /// Ends every track in the stream.
    pub fn end(&self) {
        for entry in self.tracks.iter() {
            entry.value().stop();
        }
    }

    fn first_of(&self, kind: TrackKind) -> Option<Arc<MediaTrack>> {
        self.tracks
            .iter()
            .find(|entry| entry.value().kind() == kind)
            .map(|entry| entry.value().clone())
    }
}
