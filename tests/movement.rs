//! Movement through the engine: path, lap paydays, and landing-cell effects.

mod common;

use common::{engine, started_room};
use ratrace::game::cells::CellEffect;

// Default profession nets a 3800 payday (10000 income, 6200 expenses).

#[tokio::test]
async fn landing_on_payday_cell_credits_net_payday() {
    let fixture = engine().await;
    let server = &fixture.server;
    let (room_id, active, _) = started_room(server, None).await;

    // From the start cell, 4 steps lands on the first payday cell.
    let outcome = server.move_player(&room_id, &active.id, 4).await.unwrap();
    assert_eq!(outcome.from, 0);
    assert_eq!(outcome.path, vec![1, 2, 3, 4]);
    assert_eq!(outcome.new_position, 4);
    assert_eq!(outcome.laps_completed, 0);
    assert_eq!(outcome.payday_bonus, 0);
    assert_eq!(outcome.effect, CellEffect::Payday { amount: 3_800 });

    assert_eq!(
        server.get_balance(&room_id, &active.name).await.unwrap(),
        6_800
    );
}

#[tokio::test]
async fn marker_cells_move_no_money() {
    let fixture = engine().await;
    let server = &fixture.server;
    let (room_id, active, _) = started_room(server, None).await;

    let outcome = server.move_player(&room_id, &active.id, 1).await.unwrap();
    assert_eq!(
        outcome.effect,
        CellEffect::Opportunity {
            player_id: active.id.clone(),
            position: 1
        }
    );
    assert_eq!(
        server.get_balance(&room_id, &active.name).await.unwrap(),
        3_000
    );
}

#[tokio::test]
async fn completing_a_lap_pays_out_once_per_lap() {
    let fixture = engine().await;
    let server = &fixture.server;
    let (room_id, active, _) = started_room(server, None).await;

    // 25 steps from the start: one full lap plus one cell.
    let outcome = server.move_player(&room_id, &active.id, 25).await.unwrap();
    assert_eq!(outcome.new_position, 1);
    assert_eq!(outcome.laps_completed, 1);
    assert_eq!(outcome.payday_bonus, 3_800);
    assert!(matches!(outcome.effect, CellEffect::Opportunity { .. }));

    // Intermediate payday cells on the path paid nothing; only the lap did.
    assert_eq!(
        server.get_balance(&room_id, &active.name).await.unwrap(),
        6_800
    );

    let room = server.get_room(&room_id).await.unwrap();
    let player = room.player_by_name(&active.name).unwrap();
    assert_eq!(player.position, 1);
    assert_eq!(player.stats.times_passed_go, 1);
    assert_eq!(player.stats.total_moves, 25);
    assert_eq!(player.stats.total_money_earned, 3_800);
}

#[tokio::test]
async fn multiple_laps_stack_paydays() {
    let fixture = engine().await;
    let server = &fixture.server;
    let (room_id, active, _) = started_room(server, None).await;

    // Two full laps back to the start cell, which is an expense marker.
    let outcome = server.move_player(&room_id, &active.id, 48).await.unwrap();
    assert_eq!(outcome.new_position, 0);
    assert_eq!(outcome.laps_completed, 2);
    assert_eq!(outcome.payday_bonus, 7_600);
    assert!(matches!(outcome.effect, CellEffect::Expense { .. }));
    assert_eq!(
        server.get_balance(&room_id, &active.name).await.unwrap(),
        10_600
    );
}
