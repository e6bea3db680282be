use crate::error::NegotiationError;
use crate::media::{MediaTrack, TrackSource};
use crate::peer::peer_config::PeerConfig;
use crate::peer::peer_link::{LinkEvent, LinkEventKind, LinkState, PeerLink, PeerLinkFactory, SessionId};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use meshroom_core::{IceCandidate, SdpKind, SessionDescription, UserId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Opens webrtc-rs peer connections configured with our ICE servers.
#[derive(Debug, Clone)]
pub struct RtcLinkFactory {
    ice_servers: Vec<String>,
}

impl RtcLinkFactory {
    pub fn new(config: &PeerConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
        }
    }
}

#[async_trait]
impl PeerLinkFactory for RtcLinkFactory {
    async fn open(
        &self,
        peer: &UserId,
        session: SessionId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>, NegotiationError> {
        let link = RtcLink::new(peer.clone(), session, self.ice_servers.clone(), events).await?;
        Ok(Arc::new(link))
    }
}

/// One `RTCPeerConnection` plus the senders bound to it.
pub struct RtcLink {
    peer: UserId,
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<Vec<Arc<RTCRtpSender>>>,
    receivers_added: AtomicBool,
    closed: AtomicBool,
}

impl RtcLink {
    pub async fn new(
        peer: UserId,
        session: SessionId,
        ice_servers: Vec<String>,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> anyhow::Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()
            .context("Failed to register default codecs")?;
        let registry = register_default_interceptors(Registry::new(), &mut m)
            .context("Failed to register interceptors")?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: ice_servers,
                ..Default::default()
            }],
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = events.clone();
        let uid_state = peer.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let uid = uid_state.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {}", uid, s);
                    let state = match s {
                        RTCPeerConnectionState::Connected => LinkState::Connected,
                        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
                        RTCPeerConnectionState::Failed => LinkState::Failed,
                        RTCPeerConnectionState::Closed => LinkState::Closed,
                        _ => LinkState::Connecting,
                    };
                    let _ = tx.send(LinkEvent {
                        session,
                        kind: LinkEventKind::StateChanged(state),
                    });
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx.send(LinkEvent {
                    session,
                    kind: LinkEventKind::LocalCandidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_mline_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    }),
                });
            })
        }));

        let track_tx = events;
        let uid_track = peer.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let uid = uid_track.clone();

                Box::pin(async move {
                    debug!("Remote {} track {} from {}", track.kind(), track.id(), uid);
                    let _ = tx.send(LinkEvent {
                        session,
                        kind: LinkEventKind::RemoteTrack(Arc::new(MediaTrack::remote(track))),
                    });
                })
            },
        ));

        Ok(Self {
            peer,
            peer_connection,
            senders: Mutex::new(Vec::new()),
            receivers_added: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Without local tracks the offer still has to ask for the peer's media.
    async fn ensure_receivers(&self) -> anyhow::Result<()> {
        if !self.senders.lock().await.is_empty() || self.receivers_added.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
            self.peer_connection
                .add_transceiver_from_kind(
                    kind,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .context("Failed to add receive transceiver")?;
        }
        Ok(())
    }
}

#[async_trait]
impl PeerLink for RtcLink {
    async fn add_local_track(&self, track: &Arc<MediaTrack>) -> Result<(), NegotiationError> {
        let TrackSource::Local(local) = track.source() else {
            return Err(NegotiationError::UnsupportedTrack(track.id().to_owned()));
        };

        let local: Arc<dyn TrackLocal + Send + Sync> = local.clone();
        let sender = self
            .peer_connection
            .add_track(local)
            .await
            .context("Failed to add local track")?;

        // RTCP has to be drained for interceptors to work.
        let rtcp_sender = sender.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut buf).await.is_ok() {}
        });

        self.senders.lock().await.push(sender);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        self.ensure_receivers().await?;

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("Failed to set local offer")?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("Failed to set local answer")?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let desc = match description.kind {
            SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
            SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
            SdpKind::Pranswer => RTCSessionDescription::pranswer(description.sdp),
            SdpKind::Rollback => return Err(anyhow!("rollback descriptions are not supported").into()),
        }
        .context("Failed to parse remote SDP")?;

        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for sender in self.senders.lock().await.drain(..) {
            if let Err(e) = self.peer_connection.remove_track(&sender).await {
                debug!("Failed to detach local track for {}: {}", self.peer, e);
            }
        }

        if let Err(e) = self.peer_connection.close().await {
            warn!("Failed to close peer connection for {}: {}", self.peer, e);
        }
    }
}
