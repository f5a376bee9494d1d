//! Room membership store
//!
//! Membership bookkeeping is kept behind its own type so it can be exercised
//! without a live transport. The hub handlers own all notification fan-out;
//! the store only answers who is in which room.

use dashmap::DashMap;
use std::collections::HashSet;
use std::time::Instant;
use tokio::sync::RwLock;

/// A single room: an identifier plus the set of joined member ids.
pub struct Room {
    #[allow(dead_code)]
    pub id: String,
    pub members: RwLock<HashSet<String>>,
    /// Member currently live-streaming into this room, if any.
    pub broadcaster: RwLock<Option<String>>,
    pub created_at: Instant,
}

impl Room {
    fn new(id: String) -> Self {
        Self {
            id,
            members: RwLock::new(HashSet::new()),
            broadcaster: RwLock::new(None),
            created_at: Instant::now(),
        }
    }
}

/// In-memory map of room id → [`Room`]. Rooms are created implicitly on first
/// join and removed when their member set empties.
#[derive(Default)]
pub struct RoomStore {
    rooms: DashMap<String, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Adds `member_id` to the room, creating the room if needed. Returns the
    /// members that were already present (never including `member_id`) and
    /// whether the member is new to the room; re-joining is a no-op beyond
    /// the returned enumeration.
    pub async fn join(&self, room_id: &str, member_id: &str) -> (Vec<String>, bool) {
        let room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                tracing::info!(room_id = %room_id, "Room created");
                Room::new(room_id.to_string())
            });

        let mut members = room.members.write().await;
        let existing: Vec<String> = members
            .iter()
            .filter(|m| m.as_str() != member_id)
            .cloned()
            .collect();
        let newly_added = members.insert(member_id.to_string());
        (existing, newly_added)
    }

    /// Removes `member_id` from the room. Returns `true` if the member was
    /// present. An emptied room is deleted.
    pub async fn leave(&self, room_id: &str, member_id: &str) -> bool {
        let (was_member, emptied) = match self.rooms.get(room_id) {
            Some(room) => {
                let mut members = room.members.write().await;
                let was_member = members.remove(member_id);
                (was_member, members.is_empty())
            }
            None => return false,
        };

        if emptied {
            self.rooms.remove(room_id);
            tracing::info!(room_id = %room_id, "Room deleted");
        }
        was_member
    }

    /// Current member ids of a room; empty for an unknown room.
    pub async fn members_of(&self, room_id: &str) -> Vec<String> {
        match self.rooms.get(room_id) {
            Some(room) => room.members.read().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn broadcaster_of(&self, room_id: &str) -> Option<String> {
        let room = self.rooms.get(room_id)?;
        let broadcaster = room.broadcaster.read().await.clone();
        broadcaster
    }

    /// Marks or clears the room's broadcaster. Returns `false` for an unknown
    /// room.
    pub async fn set_broadcaster(&self, room_id: &str, member_id: Option<&str>) -> bool {
        match self.rooms.get(room_id) {
            Some(room) => {
                *room.broadcaster.write().await = member_id.map(str::to_string);
                true
            }
            None => false,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Removes rooms whose member set is empty. Normal leave handling already
    /// deletes emptied rooms; this catches rooms created by a join whose
    /// connection died before the membership write became visible.
    pub async fn sweep_empty(&self) -> usize {
        let mut stale = Vec::new();
        for entry in self.rooms.iter() {
            if entry.value().members.read().await.is_empty() {
                stale.push(entry.key().clone());
            }
        }
        for room_id in &stale {
            if let Some((_, room)) = self.rooms.remove(room_id) {
                let age_ms = room.created_at.elapsed().as_millis() as u64;
                tracing::info!(room_id = %room_id, age_ms = age_ms, "Swept empty room");
            }
        }
        stale.len()
    }
}
