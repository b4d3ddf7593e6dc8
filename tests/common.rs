//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use ratrace::config::Config;
use ratrace::game::{GameServer, UserRef};

pub struct TestEngine {
    pub server: Arc<GameServer>,
    pub config: Config,
    // Keeps the data directory alive for the duration of the test.
    pub tmp: TempDir,
}

pub fn test_config(data_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = data_dir.display().to_string();
    // Tests that exercise the turn timer want short deadlines.
    config.game.min_turn_time_secs = 1;
    config.game.default_turn_time_secs = 120;
    config
}

pub async fn engine() -> TestEngine {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let server = GameServer::start(config.clone()).await.unwrap();
    TestEngine {
        server,
        config,
        tmp,
    }
}

pub fn alice() -> UserRef {
    UserRef::new("u-alice", "alice")
}

pub fn bob() -> UserRef {
    UserRef::new("u-bob", "bob")
}

pub fn carol() -> UserRef {
    UserRef::new("u-carol", "carol")
}

/// Create a two-player room, ready both players, and start the game.
/// Returns the room id, the randomly chosen active player, and the idle one.
pub async fn started_room(
    server: &GameServer,
    turn_time_secs: Option<u64>,
) -> (String, UserRef, UserRef) {
    let room = server
        .create_room("test room", 4, turn_time_secs, &alice())
        .await
        .unwrap();
    server.join_room(&room.id, &bob()).await.unwrap();
    server.set_ready(&room.id, "u-alice", true).await.unwrap();
    server.set_ready(&room.id, "u-bob", true).await.unwrap();
    let room = server.start_game(&room.id, "u-alice").await.unwrap();

    let active = room.active_player().unwrap();
    if active.user_id == "u-alice" {
        (room.id, alice(), bob())
    } else {
        (room.id, bob(), alice())
    }
}
