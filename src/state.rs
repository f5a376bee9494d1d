//! Hub process state

use crate::config::Config;
use crate::protocol::ServerMessage;
use crate::store::RoomStore;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc::UnboundedSender, RwLock};

/// Process-wide hub state: connected members plus the room store.
pub struct AppState {
    /// Connected members (member_id → handle).
    pub peers: DashMap<String, PeerHandle>,
    /// Room membership.
    pub store: RoomStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            peers: DashMap::new(),
            store: RoomStore::new(),
            config: Arc::new(config),
        }
    }
}

/// One frame queued for a connection's socket writer: either a JSON control
/// message or a raw broadcast chunk.
#[derive(Debug, Clone)]
pub enum Outbound {
    Control(ServerMessage),
    Chunk(Vec<u8>),
}

impl From<ServerMessage> for Outbound {
    fn from(msg: ServerMessage) -> Self {
        Outbound::Control(msg)
    }
}

/// The hub's view of one live connection. The handle is created on upgrade,
/// tied to the connection for its whole life, and dropped on disconnect.
pub struct PeerHandle {
    #[allow(dead_code)]
    pub id: String,
    /// Rooms this connection has joined. A connection may belong to several.
    pub rooms: RwLock<HashSet<String>>,
    pub sender: UnboundedSender<Outbound>,
    #[allow(dead_code)]
    pub connected_at: Instant,
}
