//! Persistence adapter: best-effort, non-blocking room durability.
//!
//! Backends are tiered at open time — a sled tree store first, a JSON file
//! directory if sled cannot be opened, and memory-only as the last resort.
//! Saves are fire-and-forget: gameplay hands a snapshot to an ordered writer
//! task and moves on; write failures are logged and swallowed, never
//! propagated to the operation that triggered them. Writes for the same
//! engine never reorder because the writer drains a single queue.
//!
//! `load_all` runs once at process start to rehydrate the room registry.
//! There is no lazy load on miss: a room absent from memory is not found even
//! if durably stored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::fs;
use tokio::sync::mpsc;

use crate::game::room::Room;

const SLED_DIR: &str = "rooms-db";
const JSON_DIR: &str = "rooms";
const TREE_ROOMS: &str = "rooms";

/// Errors that can arise in the persistence layer. The save path logs and
/// swallows these; only `load_all` surfaces them to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around JSON serialization errors (file backend).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, file writes).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

enum Backend {
    Sled { _db: sled::Db, rooms: sled::Tree },
    Json { dir: PathBuf },
    Memory,
}

/// Room snapshot store over whichever backend tier came up.
pub struct RoomStore {
    backend: Backend,
}

impl RoomStore {
    /// Open the best available backend under `data_dir`. Never fails: tiers
    /// fall through sled → JSON directory → memory, logging the choice.
    pub fn open_tiered(data_dir: &Path) -> Self {
        match Self::open_sled(&data_dir.join(SLED_DIR)) {
            Ok(store) => {
                info!("room persistence: sled at {}", data_dir.join(SLED_DIR).display());
                store
            }
            Err(e) => {
                warn!("sled unavailable ({e}), falling back to JSON files");
                match Self::open_json(&data_dir.join(JSON_DIR)) {
                    Ok(store) => {
                        info!(
                            "room persistence: JSON files at {}",
                            data_dir.join(JSON_DIR).display()
                        );
                        store
                    }
                    Err(e) => {
                        warn!("JSON store unavailable ({e}), rooms are memory-only");
                        Self::memory()
                    }
                }
            }
        }
    }

    pub fn open_sled(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        let rooms = db.open_tree(TREE_ROOMS)?;
        Ok(Self {
            backend: Backend::Sled { _db: db, rooms },
        })
    }

    pub fn open_json(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            backend: Backend::Json {
                dir: dir.to_path_buf(),
            },
        })
    }

    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Sled { .. } => "sled",
            Backend::Json { .. } => "json",
            Backend::Memory => "memory",
        }
    }

    fn room_key(room_id: &str) -> Vec<u8> {
        format!("rooms:{room_id}").into_bytes()
    }

    pub async fn save_room(&self, room: &Room) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Sled { rooms, .. } => {
                let bytes = bincode::serialize(room)?;
                rooms.insert(Self::room_key(&room.id), bytes)?;
                rooms.flush()?;
            }
            Backend::Json { dir } => {
                let path = dir.join(format!("{}.json", room.id));
                let bytes = serde_json::to_vec_pretty(room)?;
                fs::write(path, bytes).await?;
            }
            Backend::Memory => {}
        }
        Ok(())
    }

    /// Load every persisted room. Startup-only; records that fail to decode
    /// are skipped with a warning rather than aborting rehydration.
    pub async fn load_all(&self) -> Result<Vec<Room>, StoreError> {
        match &self.backend {
            Backend::Sled { rooms, .. } => {
                let mut out = Vec::new();
                for entry in rooms.iter() {
                    let (key, value) = entry?;
                    match bincode::deserialize::<Room>(&value) {
                        Ok(room) => out.push(room),
                        Err(e) => warn!(
                            "skipping undecodable room record {}: {e}",
                            String::from_utf8_lossy(&key)
                        ),
                    }
                }
                Ok(out)
            }
            Backend::Json { dir } => {
                let mut out = Vec::new();
                let mut entries = fs::read_dir(dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("json") {
                        continue;
                    }
                    let bytes = fs::read(&path).await?;
                    match serde_json::from_slice::<Room>(&bytes) {
                        Ok(room) => out.push(room),
                        Err(e) => warn!("skipping undecodable room file {}: {e}", path.display()),
                    }
                }
                Ok(out)
            }
            Backend::Memory => Ok(Vec::new()),
        }
    }
}

/// Handle for queueing fire-and-forget saves.
#[derive(Clone, Debug)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<Room>,
}

impl StoreHandle {
    /// Queue a room snapshot for persistence. Never blocks, never fails the
    /// caller; a closed writer just drops the snapshot.
    pub fn save(&self, snapshot: Room) {
        let _ = self.tx.send(snapshot);
    }
}

/// Spawn the writer task draining queued snapshots in order.
pub fn start_writer(store: Arc<RoomStore>) -> StoreHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Room>();
    tokio::spawn(async move {
        while let Some(room) = rx.recv().await {
            let room_id = room.id.clone();
            match store.save_room(&room).await {
                Ok(()) => debug!("persisted room {room_id}"),
                Err(e) => warn!("failed to persist room {room_id}: {e}"),
            }
        }
        debug!("room writer terminated");
    });
    StoreHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::UserRef;

    fn sample_room(name: &str) -> Room {
        Room::new(name.into(), 4, 120, &UserRef::new("u1", "alice"), 10_000)
    }

    #[tokio::test]
    async fn sled_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RoomStore::open_sled(tmp.path()).unwrap();
        let room = sample_room("alpha");
        let id = room.id.clone();
        store.save_room(&room).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, id);
        assert_eq!(loaded[0].players[0].name, "alice");
    }

    #[tokio::test]
    async fn json_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RoomStore::open_json(tmp.path()).unwrap();
        let room = sample_room("beta");
        store.save_room(&room).await.unwrap();
        // Overwrites keep one file per room.
        store.save_room(&room).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "beta");
    }

    #[tokio::test]
    async fn memory_backend_is_a_sink() {
        let store = RoomStore::memory();
        store.save_room(&sample_room("gamma")).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tiered_open_prefers_sled() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RoomStore::open_tiered(tmp.path());
        assert_eq!(store.backend_name(), "sled");
    }

    #[tokio::test]
    async fn writer_persists_queued_snapshots() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(RoomStore::open_sled(tmp.path()).unwrap());
        let handle = start_writer(store.clone());
        handle.save(sample_room("delta"));

        // Writer is asynchronous; poll briefly for the record to land.
        for _ in 0..50 {
            if !store.load_all().await.unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("queued snapshot never persisted");
    }
}
