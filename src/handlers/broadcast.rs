//! Broadcast relay
//!
//! A parallel channel over the same socket: the broadcaster's binary frames
//! fan out verbatim to the rest of the room. The relay is stateless beyond
//! remembering who is broadcasting; it never touches negotiation state.

use crate::handlers::{broadcast_to_room_except, send_to_peer};
use crate::protocol::ServerMessage;
use crate::state::{AppState, Outbound};
use std::sync::Arc;

pub async fn handle_start_stream(state: Arc<AppState>, member_id: &str, room_id: &str) {
    if !state.store.set_broadcaster(room_id, Some(member_id)).await {
        tracing::warn!(member_id = %member_id, room_id = %room_id, "start_stream for unknown room");
        return;
    }

    broadcast_to_room_except(
        &state,
        room_id,
        member_id,
        ServerMessage::StreamStarted {
            broadcaster: member_id.to_string(),
        }
        .into(),
    )
    .await;
    push_viewer_count(&state, room_id, member_id).await;

    tracing::info!(member_id = %member_id, room_id = %room_id, "Stream started");
}

pub async fn handle_end_stream(state: Arc<AppState>, member_id: &str, room_id: &str) {
    if state.store.broadcaster_of(room_id).await.as_deref() != Some(member_id) {
        return;
    }
    state.store.set_broadcaster(room_id, None).await;

    broadcast_to_room_except(&state, room_id, member_id, ServerMessage::StreamEnded.into())
        .await;

    tracing::info!(member_id = %member_id, room_id = %room_id, "Stream ended");
}

/// Relays one binary chunk. Only the current broadcaster of a room may fan
/// chunks into it; frames from anyone else are dropped.
pub async fn handle_stream_chunk(state: Arc<AppState>, member_id: &str, chunk: Vec<u8>) {
    let rooms: Vec<String> = match state.peers.get(member_id) {
        Some(handle) => handle.rooms.read().await.iter().cloned().collect(),
        None => return,
    };

    let mut target_room = None;
    for room_id in rooms {
        if state.store.broadcaster_of(&room_id).await.as_deref() == Some(member_id) {
            target_room = Some(room_id);
            break;
        }
    }

    if let Some(room_id) = target_room {
        broadcast_to_room_except(&state, &room_id, member_id, Outbound::Chunk(chunk)).await;
    }
}

pub async fn handle_chat(state: Arc<AppState>, member_id: &str, room_id: &str, text: &str) {
    broadcast_to_room_except(
        &state,
        room_id,
        member_id,
        ServerMessage::Chat {
            from: member_id.to_string(),
            text: text.to_string(),
        }
        .into(),
    )
    .await;
}

/// Pushes the current audience size to everyone in the room, broadcaster
/// included.
pub(crate) async fn push_viewer_count(state: &AppState, room_id: &str, broadcaster: &str) {
    let members = state.store.members_of(room_id).await;
    let count = members.iter().filter(|m| m.as_str() != broadcaster).count();
    for member_id in &members {
        send_to_peer(state, member_id, ServerMessage::ViewerCount { count }.into());
    }
}
