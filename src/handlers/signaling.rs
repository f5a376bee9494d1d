//! WebRTC signaling relay
//!
//! The hub is a dumb pipe: each relay forwards `{from, payload}` to the
//! target only. There is no check that sender and target share a room, no
//! delivery confirmation, and a missing target drops the message.

use crate::handlers::send_to_peer;
use crate::state::AppState;
use crate::protocol::ServerMessage;
use std::sync::Arc;

pub async fn handle_offer(state: Arc<AppState>, from_id: &str, target: &str, sdp: &str) {
    send_to_peer(
        &state,
        target,
        ServerMessage::Offer {
            from: from_id.to_string(),
            sdp: sdp.to_string(),
        }
        .into(),
    );

    tracing::debug!(from = %from_id, target = %target, "Relayed offer");
}

pub async fn handle_answer(state: Arc<AppState>, from_id: &str, target: &str, sdp: &str) {
    send_to_peer(
        &state,
        target,
        ServerMessage::Answer {
            from: from_id.to_string(),
            sdp: sdp.to_string(),
        }
        .into(),
    );

    tracing::debug!(from = %from_id, target = %target, "Relayed answer");
}

pub async fn handle_ice_candidate(
    state: Arc<AppState>,
    from_id: &str,
    target: &str,
    candidate: &str,
) {
    send_to_peer(
        &state,
        target,
        ServerMessage::IceCandidate {
            from: from_id.to_string(),
            candidate: candidate.to_string(),
        }
        .into(),
    );

    tracing::debug!(from = %from_id, target = %target, "Relayed ICE candidate");
}
