//! Hub handlers

pub mod broadcast;
pub mod connection;
pub mod room;
pub mod signaling;

pub use broadcast::*;
pub use connection::*;
pub use room::*;
pub use signaling::*;

use crate::state::{AppState, Outbound};

/// Sends one message to one member. Unknown targets are a silent no-op: this
/// protocol has no delivery acknowledgment.
pub(crate) fn send_to_peer(state: &AppState, member_id: &str, message: Outbound) {
    if let Some(handle) = state.peers.get(member_id) {
        let _ = handle.sender.send(message);
    }
}

/// Fans a message out to every room member except `except_id`.
pub(crate) async fn broadcast_to_room_except(
    state: &AppState,
    room_id: &str,
    except_id: &str,
    message: Outbound,
) {
    for member_id in state.store.members_of(room_id).await {
        if member_id != except_id {
            send_to_peer(state, &member_id, message.clone());
        }
    }
}
