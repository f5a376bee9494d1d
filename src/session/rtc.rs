//! WebRTC-backed negotiation object

use crate::error::LinkError;
use crate::media::{LocalMediaSource, MediaKind};
use crate::session::link::{LinkEvent, LinkEventSender, LinkFactory, LinkState, PeerLink, SdpKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// [`PeerLink`] over an `RTCPeerConnection`.
///
/// Remote candidates arriving before the remote description are held here
/// until it lands, then flushed in arrival order.
pub struct RtcLink {
    pc: Arc<RTCPeerConnection>,
    pending_candidates: Mutex<Vec<String>>,
    remote_set: AtomicBool,
}

impl RtcLink {
    pub async fn new(
        stun_servers: &[String],
        peer_id: &str,
        events: LinkEventSender,
        media: &LocalMediaSource,
    ) -> Result<Self, LinkError> {
        let mut engine = MediaEngine::default();
        engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut engine)?;
        let api = APIBuilder::new()
            .with_media_engine(engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: stun_servers.to_vec(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let pc = Arc::new(api.new_peer_connection(config).await?);

        // One outbound track per media component; the component handles stay
        // shared with every other link.
        for component in media.all_components() {
            let (mime, id) = match component.kind() {
                MediaKind::Audio => (MIME_TYPE_OPUS, "audio"),
                MediaKind::Video => (MIME_TYPE_VP8, "video"),
            };
            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime.to_owned(),
                    ..Default::default()
                },
                id.to_owned(),
                component.label().to_owned(),
            ));
            pc.add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
                .await?;
        }

        let peer = peer_id.to_string();
        let tx = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let peer = peer.clone();
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send((peer, LinkEvent::StateChanged(map_state(state))));
            })
        }));

        let peer = peer_id.to_string();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let peer = peer.clone();
            let tx = events.clone();
            Box::pin(async move {
                if let Some(candidate) = candidate {
                    if let Ok(init) = candidate.to_json() {
                        if let Ok(json) = serde_json::to_string(&init) {
                            let _ = tx.send((peer, LinkEvent::LocalCandidate(json)));
                        }
                    }
                }
            })
        }));

        Ok(Self {
            pc,
            pending_candidates: Mutex::new(Vec::new()),
            remote_set: AtomicBool::new(false),
        })
    }

    async fn apply_candidate(&self, candidate: &str) -> Result<(), LinkError> {
        let init: RTCIceCandidateInit = serde_json::from_str(candidate)?;
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }
}

fn map_state(state: RTCPeerConnectionState) -> LinkState {
    match state {
        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => LinkState::New,
        RTCPeerConnectionState::Connecting => LinkState::Connecting,
        RTCPeerConnectionState::Connected => LinkState::Connected,
        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
        RTCPeerConnectionState::Failed => LinkState::Failed,
        RTCPeerConnectionState::Closed => LinkState::Closed,
    }
}

fn description(kind: SdpKind, sdp: &str) -> Result<RTCSessionDescription, LinkError> {
    let desc = match kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp.to_string())?,
        SdpKind::Answer => RTCSessionDescription::answer(sdp.to_string())?,
    };
    Ok(desc)
}

#[async_trait]
impl PeerLink for RtcLink {
    async fn create_offer(&self) -> Result<String, LinkError> {
        let offer = self.pc.create_offer(None).await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String, LinkError> {
        let answer = self.pc.create_answer(None).await?;
        Ok(answer.sdp)
    }

    async fn set_local(&self, kind: SdpKind, sdp: &str) -> Result<(), LinkError> {
        self.pc.set_local_description(description(kind, sdp)?).await?;
        Ok(())
    }

    async fn set_remote(&self, kind: SdpKind, sdp: &str) -> Result<(), LinkError> {
        self.pc
            .set_remote_description(description(kind, sdp)?)
            .await?;
        self.remote_set.store(true, Ordering::SeqCst);

        let queued: Vec<String> = self.pending_candidates.lock().await.drain(..).collect();
        for candidate in queued {
            // A single bad candidate shouldn't sink the description.
            if let Err(err) = self.apply_candidate(&candidate).await {
                tracing::warn!(error = %err, "Dropped queued candidate");
            }
        }
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: &str) -> Result<(), LinkError> {
        if !self.remote_set.load(Ordering::SeqCst) {
            self.pending_candidates
                .lock()
                .await
                .push(candidate.to_string());
            return Ok(());
        }
        self.apply_candidate(candidate).await
    }

    async fn close(&self) {
        if let Err(err) = self.pc.close().await {
            tracing::debug!(error = %err, "Peer connection close reported an error");
        }
    }
}

/// Builds [`RtcLink`]s with a fixed STUN server list.
pub struct RtcLinkFactory {
    pub stun_servers: Vec<String>,
}

#[async_trait]
impl LinkFactory for RtcLinkFactory {
    async fn create(
        &self,
        peer_id: &str,
        events: LinkEventSender,
        media: &LocalMediaSource,
    ) -> Result<Arc<dyn PeerLink>, LinkError> {
        let link = RtcLink::new(&self.stun_servers, peer_id, events, media).await?;
        Ok(Arc::new(link))
    }
}
