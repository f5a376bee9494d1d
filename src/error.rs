//! Error taxonomy

use thiserror::Error;

/// Errors raised by the client-side signaling channel.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("signaling channel closed")]
    Closed,
}

/// Errors raised by a negotiation object.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("peer connection error: {0}")]
    Rtc(#[from] webrtc::Error),

    #[error("malformed ICE candidate: {0}")]
    Candidate(#[from] serde_json::Error),

    #[error("link is closed")]
    Closed,
}

/// Errors raised while acquiring a local media source.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("permission to use capture devices was denied")]
    PermissionDenied,

    #[error("no usable capture device: {0}")]
    NoDevice(String),
}
