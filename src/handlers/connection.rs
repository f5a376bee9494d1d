//! Connection lifecycle handlers

use crate::protocol::ServerMessage;
use crate::state::{AppState, Outbound, PeerHandle};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc::UnboundedSender, RwLock};
use uuid::Uuid;

/// Registers a new connection and greets it with its member id.
pub async fn handle_connection(
    state: Arc<AppState>,
    sender: UnboundedSender<Outbound>,
) -> String {
    let member_id = Uuid::new_v4().to_string();

    let handle = PeerHandle {
        id: member_id.clone(),
        rooms: RwLock::new(HashSet::new()),
        sender: sender.clone(),
        connected_at: Instant::now(),
    };

    state.peers.insert(member_id.clone(), handle);

    let _ = sender.send(
        ServerMessage::Connected {
            member_id: member_id.clone(),
        }
        .into(),
    );

    tracing::info!(member_id = %member_id, "New connection established");
    member_id
}

/// Runs leave fan-out for every room the member belonged to, then drops the
/// handle. Must run on the socket-closed event, while membership is still
/// enumerable.
pub async fn handle_disconnect(state: Arc<AppState>, member_id: &str) {
    if let Some((_, handle)) = state.peers.remove(member_id) {
        let rooms: Vec<String> = handle.rooms.read().await.iter().cloned().collect();
        for room_id in rooms {
            crate::handlers::room::leave_room_internal(&state, member_id, &room_id).await;
        }
    }
    tracing::info!(member_id = %member_id, "Connection closed");
}

/// Heartbeat keep-alive.
pub fn handle_heartbeat(sender: &UnboundedSender<Outbound>) {
    let _ = sender.send(ServerMessage::HeartbeatAck.into());
}
