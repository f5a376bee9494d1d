//! Client/server message protocol definitions

use serde::{Deserialize, Serialize};

/// Client → server messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Management
    Join { room_id: String },
    Leave { room_id: String },

    // WebRTC Signaling (always addressed to one member)
    Offer {
        target: String,
        sdp: String,
    },
    Answer {
        target: String,
        sdp: String,
    },
    IceCandidate {
        target: String,
        candidate: String,
    },

    // Broadcast channel
    StartStream { room_id: String },
    EndStream { room_id: String },
    Chat { room_id: String, text: String },
}

/// Server → client messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    // Connection
    Connected { member_id: String },
    HeartbeatAck,

    // Room Events
    ExistingUsers {
        users: Vec<String>,
    },
    UserJoined {
        member_id: String,
    },
    UserLeft {
        member_id: String,
    },

    // WebRTC Signaling
    Offer {
        from: String,
        sdp: String,
    },
    Answer {
        from: String,
        sdp: String,
    },
    IceCandidate {
        from: String,
        candidate: String,
    },

    // Broadcast channel
    StreamStarted {
        broadcaster: String,
    },
    StreamEnded,
    Chat {
        from: String,
        text: String,
    },
    ViewerCount {
        count: usize,
    },
}
