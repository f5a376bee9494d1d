//! Client-side peer session engine

pub mod channel;
pub mod link;
pub mod manager;
pub mod peer;
pub mod rtc;

pub use channel::SignalingChannel;
pub use link::{LinkEvent, LinkEventSender, LinkFactory, LinkState, PeerLink, SdpKind};
pub use manager::{EngineEvent, SessionManager};
pub use peer::{NegotiationState, PeerSession};
pub use rtc::{RtcLink, RtcLinkFactory};
