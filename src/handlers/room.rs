//! Room membership handlers

use crate::handlers::{broadcast_to_room_except, send_to_peer};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;

/// Join: the caller receives the members that were already present, everyone
/// else receives `user_joined`. Unknown rooms are created; there is no error
/// path and re-joining is a no-op beyond the enumeration reply.
pub async fn handle_join(state: Arc<AppState>, member_id: &str, room_id: &str) {
    let room_id = room_id.trim().to_string();

    let (existing, newly_added) = state.store.join(&room_id, member_id).await;

    if let Some(handle) = state.peers.get(member_id) {
        handle.rooms.write().await.insert(room_id.clone());
        let _ = handle.sender.send(
            ServerMessage::ExistingUsers {
                users: existing.clone(),
            }
            .into(),
        );
    }

    // A re-join changes nothing for the rest of the room.
    if newly_added {
        for other_id in &existing {
            send_to_peer(
                &state,
                other_id,
                ServerMessage::UserJoined {
                    member_id: member_id.to_string(),
                }
                .into(),
            );
        }

        // A stream may already be running in this room; late joiners are told
        // who is broadcasting, and the room sees the audience grow.
        if let Some(broadcaster) = state.store.broadcaster_of(&room_id).await {
            send_to_peer(
                &state,
                member_id,
                ServerMessage::StreamStarted {
                    broadcaster: broadcaster.clone(),
                }
                .into(),
            );
            crate::handlers::broadcast::push_viewer_count(&state, &room_id, &broadcaster).await;
        }
    }

    tracing::info!(
        member_id = %member_id,
        room_id = %room_id,
        existing = existing.len(),
        "Member joined room"
    );
}

/// Explicit leave of a single room.
pub async fn handle_leave(state: Arc<AppState>, member_id: &str, room_id: &str) {
    if let Some(handle) = state.peers.get(member_id) {
        handle.rooms.write().await.remove(room_id);
    }
    leave_room_internal(&state, member_id, room_id).await;
}

/// Shared leave fan-out, also used per room on disconnect. Remaining members
/// receive `user_left` exactly once.
pub async fn leave_room_internal(state: &AppState, member_id: &str, room_id: &str) {
    let was_broadcaster =
        state.store.broadcaster_of(room_id).await.as_deref() == Some(member_id);

    if !state.store.leave(room_id, member_id).await {
        return;
    }

    broadcast_to_room_except(
        state,
        room_id,
        member_id,
        ServerMessage::UserLeft {
            member_id: member_id.to_string(),
        }
        .into(),
    )
    .await;

    if was_broadcaster {
        state.store.set_broadcaster(room_id, None).await;
        broadcast_to_room_except(state, room_id, member_id, ServerMessage::StreamEnded.into())
            .await;
    } else if let Some(broadcaster) = state.store.broadcaster_of(room_id).await {
        crate::handlers::broadcast::push_viewer_count(state, room_id, &broadcaster).await;
    }

    tracing::info!(member_id = %member_id, room_id = %room_id, "Member left room");
}

/// Periodic sweep of rooms left empty by connections that died mid-join.
pub async fn sweep_rooms(state: Arc<AppState>) {
    let swept = state.store.sweep_empty().await;
    if swept > 0 {
        tracing::info!(swept_rooms = swept, "Sweep completed");
    }
}
