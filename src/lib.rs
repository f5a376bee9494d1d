//! Roomcast: WebRTC video-chat signaling hub and peer session engine.
//!
//! The hub side (`state`, `store`, `handlers`) tracks room membership and
//! relays signaling payloads by target member id. The client side (`session`,
//! `media`) drives one negotiation per remote peer through the hub to a
//! connected state, or cleans it up.

pub mod config;
pub mod error;
pub mod handlers;
pub mod media;
pub mod protocol;
pub mod room_code;
pub mod session;
pub mod state;
pub mod store;
