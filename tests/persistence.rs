//! Rooms survive an engine restart; ledger balances are re-seeded from the
//! persisted cash mirrors.

mod common;

use std::time::Duration;

use common::{alice, bob, test_config};
use ratrace::game::room::NamedLoanKind;
use ratrace::game::{GameServer, RoomStatus};
use ratrace::storage::RoomStore;

#[tokio::test]
async fn rooms_survive_engine_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let room_id = {
        let server = GameServer::start(config.clone()).await.unwrap();
        let room = server
            .create_room("durable room", 4, None, &alice())
            .await
            .unwrap();
        server.join_room(&room.id, &bob()).await.unwrap();
        server.set_ready(&room.id, "u-alice", true).await.unwrap();
        server.set_ready(&room.id, "u-bob", true).await.unwrap();
        server.start_game(&room.id, "u-alice").await.unwrap();

        // Transfer alone does not snapshot the room; the payoff does, and its
        // snapshot carries both synchronized cash mirrors.
        server
            .transfer_funds(&room.id, "alice", "bob", 500)
            .await
            .unwrap();
        server
            .payoff_named_loan(&room.id, "alice", NamedLoanKind::Car, 1_000)
            .await
            .unwrap();

        server.shutdown().await;
        room.id
    };

    // The first engine is gone; wait for its background tasks to finish
    // draining and release the store.
    let sled_dir = tmp.path().join("rooms-db");
    let mut reopened = None;
    for _ in 0..100 {
        match RoomStore::open_sled(&sled_dir) {
            Ok(store) => {
                reopened = Some(store);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    let store = reopened.expect("store never released by the first engine");
    let rooms = store.load_all().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, room_id);
    drop(store);

    let server = GameServer::start(config).await.unwrap();
    let room = server.get_room(&room_id).await.unwrap();
    assert_eq!(room.status, RoomStatus::Playing);
    assert_eq!(room.players.len(), 2);
    assert_eq!(room.name, "durable room");

    // Balances come back from the persisted mirrors: alice 3000 - 500 - 1000,
    // bob 3000 + 500.
    assert_eq!(server.get_balance(&room_id, "alice").await.unwrap(), 1_500);
    assert_eq!(server.get_balance(&room_id, "bob").await.unwrap(), 3_500);
    assert!(room.player_by_name("alice").unwrap().named_loan_paid(NamedLoanKind::Car));

    // The rehydrated playing room has a live turn timer again.
    let left = server.turn_time_left(&room_id).await;
    assert!(left > 0, "turn timer not re-armed after restart");
    server.shutdown().await;
}

#[tokio::test]
async fn fresh_data_dir_starts_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let server = GameServer::start(test_config(tmp.path())).await.unwrap();
    assert_eq!(server.room_count().await, 0);
    assert!(server.list_rooms().await.is_empty());
    server.shutdown().await;
}
