//! Lobby lifecycle: room creation, joining, readiness, and game start.

mod common;

use common::{alice, bob, carol, engine, started_room};
use ratrace::errors::GameError;
use ratrace::game::RoomStatus;

#[tokio::test]
async fn create_room_validates_name_and_capacity() {
    let fixture = engine().await;
    let server = &fixture.server;

    let err = server.create_room("ab", 4, None, &alice()).await.unwrap_err();
    assert!(matches!(err, GameError::InvalidArgument(_)));

    let err = server.create_room("fine name", 1, None, &alice()).await.unwrap_err();
    assert!(matches!(err, GameError::InvalidArgument(_)));

    let err = server.create_room("fine name", 99, None, &alice()).await.unwrap_err();
    assert!(matches!(err, GameError::InvalidArgument(_)));

    let room = server
        .create_room("  padded name  ", 4, None, &alice())
        .await
        .unwrap();
    assert_eq!(room.name, "padded name");
    assert_eq!(room.status, RoomStatus::Waiting);
    assert!(room.players[0].is_host);
}

#[tokio::test]
async fn turn_time_is_clamped_to_minimum() {
    let fixture = engine().await;
    let server = &fixture.server;

    let room = server
        .create_room("quick room", 4, Some(0), &alice())
        .await
        .unwrap();
    assert_eq!(room.turn_time_secs, fixture.config.game.min_turn_time_secs);

    let room = server.create_room("slow room", 4, None, &alice()).await.unwrap();
    assert_eq!(
        room.turn_time_secs,
        fixture.config.game.default_turn_time_secs
    );
}

#[tokio::test]
async fn join_is_idempotent_and_respects_capacity() {
    let fixture = engine().await;
    let server = &fixture.server;

    let room = server.create_room("small room", 2, None, &alice()).await.unwrap();
    server.join_room(&room.id, &bob()).await.unwrap();

    // Joining again is a no-op, not a duplicate roster entry.
    let rejoined = server.join_room(&room.id, &bob()).await.unwrap();
    assert_eq!(rejoined.players.len(), 2);

    let err = server.join_room(&room.id, &carol()).await.unwrap_err();
    assert!(matches!(err, GameError::Conflict(_)));
}

#[tokio::test]
async fn start_requires_host_and_ready_quorum() {
    let fixture = engine().await;
    let server = &fixture.server;

    let room = server.create_room("game room", 4, None, &alice()).await.unwrap();
    server.join_room(&room.id, &bob()).await.unwrap();

    let err = server.start_game(&room.id, "u-bob").await.unwrap_err();
    assert!(matches!(err, GameError::Forbidden(_)));

    // Nobody ready yet.
    let err = server.start_game(&room.id, "u-alice").await.unwrap_err();
    assert!(matches!(err, GameError::InvalidArgument(_)));

    server.set_ready(&room.id, "u-alice", true).await.unwrap();
    server.set_ready(&room.id, "u-bob", true).await.unwrap();
    let started = server.start_game(&room.id, "u-alice").await.unwrap();
    assert_eq!(started.status, RoomStatus::Playing);
    assert!(started.active_index < started.players.len());

    // Starting twice conflicts, and the room no longer accepts joins.
    let err = server.start_game(&room.id, "u-alice").await.unwrap_err();
    assert!(matches!(err, GameError::Conflict(_)));
    let err = server.join_room(&room.id, &carol()).await.unwrap_err();
    assert!(matches!(err, GameError::Conflict(_)));
}

#[tokio::test]
async fn token_selection_is_exclusive() {
    let fixture = engine().await;
    let server = &fixture.server;

    let room = server.create_room("token room", 4, None, &alice()).await.unwrap();
    server.join_room(&room.id, &bob()).await.unwrap();

    server.select_token(&room.id, "u-alice", "hat").await.unwrap();
    let err = server
        .select_token(&room.id, "u-bob", "hat")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Conflict(_)));

    // Re-selecting your own token is fine, as is picking a free one.
    server.select_token(&room.id, "u-alice", "hat").await.unwrap();
    let room = server.select_token(&room.id, "u-bob", "car").await.unwrap();
    let tokens: Vec<_> = room
        .players
        .iter()
        .filter_map(|p| p.selected_token.clone())
        .collect();
    assert_eq!(tokens, vec!["hat", "car"]);
}

#[tokio::test]
async fn summaries_reflect_lobby_state() {
    let fixture = engine().await;
    let server = &fixture.server;

    server.create_room("alpha room", 4, None, &alice()).await.unwrap();
    let (started_id, _, _) = started_room(server, None).await;

    let summaries = server.list_rooms().await;
    assert_eq!(summaries.len(), 2);
    let started = summaries.iter().find(|s| s.id == started_id).unwrap();
    assert_eq!(started.status, RoomStatus::Playing);
    assert_eq!(started.players, 2);
}

#[tokio::test]
async fn missing_room_is_not_found() {
    let fixture = engine().await;
    let err = fixture.server.get_room("nope").await.unwrap_err();
    assert!(matches!(err, GameError::NotFound(_)));
}
