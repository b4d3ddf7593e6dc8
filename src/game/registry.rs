//! Room registry: explicit ownership of every live room.
//!
//! Rooms are held behind per-room `Arc<Mutex<_>>` so that all mutation of one
//! room — request-driven or timer-driven — funnels through a single lock,
//! while independent rooms stay uncoordinated. The registry itself is a
//! constructed service, not a process-wide singleton.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::game::room::{Room, RoomSummary};

pub type SharedRoom = Arc<Mutex<Room>>;

#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, SharedRoom>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room, returning its shared handle.
    pub async fn insert(&self, room: Room) -> SharedRoom {
        let id = room.id.clone();
        let shared = Arc::new(Mutex::new(room));
        self.rooms.write().await.insert(id, shared.clone());
        shared
    }

    pub async fn get(&self, room_id: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(room_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Lobby summaries of every room. Takes each room lock briefly.
    pub async fn summaries(&self) -> Vec<RoomSummary> {
        let handles: Vec<SharedRoom> = self.rooms.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.lock().await.summary());
        }
        out
    }
}
