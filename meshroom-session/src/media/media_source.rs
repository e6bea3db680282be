use crate::error::MediaError;
use crate::media::media_track::{MediaTrack, TrackKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Locally captured tracks, shared read-only by every peer session.
#[derive(Debug, Default)]
pub struct LocalMedia {
    tracks: Vec<Arc<MediaTrack>>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<Arc<MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<MediaTrack>] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Local capture device access (camera + microphone).
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn capture(&self) -> Result<LocalMedia, MediaError>;
}

/// Opus + VP8 sample tracks for an external capture pipeline to write into.
pub struct SampleMediaSource {
    stream_id: String,
}

impl SampleMediaSource {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

#[async_trait]
impl MediaSource for SampleMediaSource {
    async fn capture(&self) -> Result<LocalMedia, MediaError> {
        let audio = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            self.stream_id.clone(),
        ));

        let video = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            "video".to_owned(),
            self.stream_id.clone(),
        ));

        info!("Local sample tracks ready for stream {}", self.stream_id);

        Ok(LocalMedia::new(vec![
            Arc::new(MediaTrack::local(audio, TrackKind::Audio)),
            Arc::new(MediaTrack::local(video, TrackKind::Video)),
        ]))
    }
}
