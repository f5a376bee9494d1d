//! Negotiation object seam
//!
//! A [`PeerLink`] is the media-session handle for one remote peer. The session
//! engine drives it through offer/answer exchange and observes it through
//! [`LinkEvent`]s; the production implementation wraps a WebRTC peer
//! connection, tests use a scripted fake.

use crate::error::LinkError;
use crate::media::LocalMediaSource;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Transport-level connectivity of one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl LinkState {
    /// Failed and closed links are beyond recovery; disconnected ones get a
    /// grace window first.
    pub fn is_fatal(self) -> bool {
        matches!(self, LinkState::Failed | LinkState::Closed)
    }
}

/// Events a link pushes back into the engine queue.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    StateChanged(LinkState),
    /// A locally discovered ICE candidate, serialized for relay. These keep
    /// firing after negotiation completes and are forwarded independently.
    LocalCandidate(String),
}

/// Sender for `(peer_id, event)` pairs out of a link's callbacks.
pub type LinkEventSender = mpsc::UnboundedSender<(String, LinkEvent)>;

/// One peer-to-peer media negotiation handle.
///
/// Implementations own the offer/answer validity checks the platform defines;
/// the engine layers its own state machine on top. Candidates delivered
/// before the remote description must be queued internally (trickle ICE).
#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn create_offer(&self) -> Result<String, LinkError>;

    async fn create_answer(&self) -> Result<String, LinkError>;

    async fn set_local(&self, kind: SdpKind, sdp: &str) -> Result<(), LinkError>;

    async fn set_remote(&self, kind: SdpKind, sdp: &str) -> Result<(), LinkError>;

    async fn add_remote_candidate(&self, candidate: &str) -> Result<(), LinkError>;

    /// Releases everything the link holds, including transmitted track
    /// references. Must be safe to call at any point and must not fail.
    async fn close(&self);
}

/// Injectable link construction, so the engine never names a concrete
/// implementation.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    async fn create(
        &self,
        peer_id: &str,
        events: LinkEventSender,
        media: &LocalMediaSource,
    ) -> Result<Arc<dyn PeerLink>, LinkError>;
}
