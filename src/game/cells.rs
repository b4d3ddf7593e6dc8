//! Cell effects: the fixed position → category table and its dispatcher.
//!
//! Landing on a payday cell credits the player's net payday through the
//! ledger. Every other category produces a pending-action marker consumed by
//! out-of-scope flows (deal resolution, forced expenses, charity donations);
//! those flows call the ledger themselves.

use serde::Serialize;

use crate::bank::ledger::{Ledger, PaydayReason};
use crate::game::board::BOARD_SIZE;
use crate::game::room::Player;

/// Financial category of a board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Payday,
    Opportunity,
    Market,
    Expense,
    Loss,
    /// Charity/chance cells (donations and child events).
    Charity,
}

/// Position → category, 0-based. Ported from the legacy 24-cell inner-circle
/// layout; the category order around the board is unchanged.
pub const CELL_TABLE: [CellKind; BOARD_SIZE] = [
    CellKind::Expense,     // 0
    CellKind::Opportunity, // 1
    CellKind::Market,      // 2
    CellKind::Charity,     // 3
    CellKind::Payday,      // 4
    CellKind::Opportunity, // 5
    CellKind::Market,      // 6
    CellKind::Expense,     // 7
    CellKind::Opportunity, // 8
    CellKind::Market,      // 9
    CellKind::Expense,     // 10
    CellKind::Charity,     // 11 (child/chance)
    CellKind::Payday,      // 12
    CellKind::Opportunity, // 13
    CellKind::Market,      // 14
    CellKind::Opportunity, // 15
    CellKind::Expense,     // 16
    CellKind::Opportunity, // 17
    CellKind::Market,      // 18
    CellKind::Loss,        // 19
    CellKind::Payday,      // 20
    CellKind::Opportunity, // 21
    CellKind::Market,      // 22
    CellKind::Opportunity, // 23
];

pub fn cell_kind(position: usize) -> CellKind {
    CELL_TABLE[position % BOARD_SIZE]
}

/// Outcome of landing on a cell. `Payday` has already moved money; the other
/// variants are markers for out-of-scope resolution flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellEffect {
    Payday { amount: i64 },
    Opportunity { player_id: String, position: usize },
    Market { player_id: String, position: usize },
    Expense { player_id: String, position: usize },
    Loss { player_id: String, position: usize },
    Charity { player_id: String, position: usize },
}

/// Dispatch the effect for the player's current position. Only the landing
/// cell is evaluated; intermediate cells of a move never trigger.
pub fn apply_cell_effect(ledger: &Ledger, room_id: &str, player: &mut Player) -> CellEffect {
    let position = player.position;
    match cell_kind(position) {
        CellKind::Payday => {
            let amount = ledger.apply_payday(room_id, player, PaydayReason::Cell);
            CellEffect::Payday { amount }
        }
        CellKind::Opportunity => CellEffect::Opportunity {
            player_id: player.user_id.clone(),
            position,
        },
        CellKind::Market => CellEffect::Market {
            player_id: player.user_id.clone(),
            position,
        },
        CellKind::Expense => CellEffect::Expense {
            player_id: player.user_id.clone(),
            position,
        },
        CellKind::Loss => CellEffect::Loss {
            player_id: player.user_id.clone(),
            position,
        },
        CellKind::Charity => CellEffect::Charity {
            player_id: player.user_id.clone(),
            position,
        },
    }
}
