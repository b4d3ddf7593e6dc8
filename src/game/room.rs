//! Room and player aggregates.
//!
//! A [`Room`] is the unit of play: an ordered roster of [`Player`]s, a status
//! (waiting or playing), and the turn bookkeeping the scheduler and movement
//! engine operate on. All financial fields are strictly typed with defaults
//! applied at construction; balances themselves live in the banking ledger and
//! `Player::cash` is only a synchronized mirror of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-child expense used in turn-level financial summaries and the
/// credit-limit base. Deliberately distinct from [`CHILD_EXPENSES_PAYDAY`];
/// the two figures are inconsistent upstream and must stay separate.
pub const CHILD_EXPENSES_PER_TURN: i64 = 400;

/// Per-child expense used when computing lap and cell paydays (and the
/// forced-expense base). See [`CHILD_EXPENSES_PER_TURN`].
pub const CHILD_EXPENSES_PAYDAY: i64 = 1000;

/// Stable identity handed in by the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
}

impl UserRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
}

/// Salary/expense profile. Normally supplied by the external profession
/// source; the default matches the stock "entrepreneur" profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profession {
    pub name: String,
    pub salary: i64,
    pub expenses: i64,
}

impl Default for Profession {
    fn default() -> Self {
        Self {
            name: "Entrepreneur".to_string(),
            salary: 10_000,
            expenses: 6_200,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub dice_rolled: u32,
    pub total_moves: u32,
    pub times_passed_go: u32,
    pub total_money_earned: i64,
}

/// Fixed-origin debt categories, independent of the step-based credit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedLoanKind {
    Car,
    Education,
    Mortgage,
    CreditCards,
}

impl NamedLoanKind {
    pub fn label(&self) -> &'static str {
        match self {
            NamedLoanKind::Car => "car loan",
            NamedLoanKind::Education => "education loan",
            NamedLoanKind::Mortgage => "mortgage",
            NamedLoanKind::CreditCards => "credit cards",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub user_id: String,
    pub name: String,
    /// Board position, 0-based.
    pub position: usize,
    /// Mirror of the ledger balance; the ledger is authoritative.
    pub cash: i64,
    pub passive_income: i64,
    pub profession: Profession,
    #[serde(default)]
    pub children_count: u8,
    /// Named loan category -> paid off.
    #[serde(default)]
    pub named_loans: HashMap<NamedLoanKind, bool>,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub stats: PlayerStats,
    #[serde(default)]
    pub selected_token: Option<String>,
    #[serde(default)]
    pub selected_dream: Option<String>,
    pub is_host: bool,
    #[serde(default)]
    pub is_ready: bool,
}

impl Player {
    /// New roster entry with zeroed stats and the default profession.
    pub fn new(user: &UserRef, is_host: bool, starting_cash: i64) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            position: 0,
            cash: starting_cash,
            passive_income: 0,
            profession: Profession::default(),
            children_count: 0,
            named_loans: HashMap::new(),
            assets: Vec::new(),
            stats: PlayerStats::default(),
            selected_token: None,
            selected_dream: None,
            is_host,
            is_ready: false,
        }
    }

    pub fn total_income(&self) -> i64 {
        self.profession.salary + self.passive_income
    }

    /// Net payday for a given per-child multiplier, floored at zero.
    pub fn payday_amount(&self, child_multiplier: i64) -> i64 {
        let expenses =
            self.profession.expenses + i64::from(self.children_count) * child_multiplier;
        (self.total_income() - expenses).max(0)
    }

    pub fn named_loan_paid(&self, kind: NamedLoanKind) -> bool {
        self.named_loans.get(&kind).copied().unwrap_or(false)
    }
}

/// Result of the most recent die roll in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastRoll {
    pub player_id: String,
    pub die: u8,
    pub rolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub max_players: usize,
    /// Turn duration in seconds, enforced by the turn scheduler.
    pub turn_time_secs: u64,
    pub status: RoomStatus,
    /// Index into `players` of the turn owner. Always valid while playing.
    pub active_index: usize,
    /// Gates exactly one roll per turn cycle.
    pub has_rolled_this_turn: bool,
    pub players: Vec<Player>,
    #[serde(default)]
    pub last_roll: Option<LastRoll>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Room {
    pub fn new(
        name: String,
        max_players: usize,
        turn_time_secs: u64,
        creator: &UserRef,
        starting_cash: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            max_players,
            turn_time_secs,
            status: RoomStatus::Waiting,
            active_index: 0,
            has_rolled_this_turn: false,
            players: vec![Player::new(creator, true, starting_cash)],
            last_roll: None,
            created_at: now,
            updated_at: now,
            last_activity: now,
        }
    }

    /// Refresh the modification timestamps.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        self.last_activity = now;
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn ready_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_ready).count()
    }

    /// Start requires a quorum of ready players.
    pub fn can_start(&self, min_players: usize) -> bool {
        self.players.len() >= min_players && self.ready_count() >= min_players
    }

    pub fn active_player(&self) -> Option<&Player> {
        self.players.get(self.active_index)
    }

    pub fn player_by_id(&self, user_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn player_mut_by_id(&mut self, user_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn player_mut_by_name(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    /// Round-robin turn advance: next player becomes active, the roll gate
    /// resets. Callers re-arm the turn scheduler.
    pub fn advance_turn(&mut self) {
        let count = self.players.len().max(1);
        self.active_index = (self.active_index + 1) % count;
        self.has_rolled_this_turn = false;
        self.touch();
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            players: self.players.len(),
            max_players: self.max_players,
            ready_count: self.ready_count(),
            status: self.status,
            can_start: self.can_start(2),
            taken_tokens: self
                .players
                .iter()
                .filter_map(|p| p.selected_token.clone())
                .collect(),
        }
    }
}

/// Lobby-facing view of a room.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub players: usize,
    pub max_players: usize,
    pub ready_count: usize,
    pub status: RoomStatus,
    pub can_start: bool,
    pub taken_tokens: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_with(salary: i64, passive: i64, expenses: i64, children: u8) -> Player {
        let mut p = Player::new(&UserRef::new("u1", "alice"), false, 0);
        p.profession.salary = salary;
        p.profession.expenses = expenses;
        p.passive_income = passive;
        p.children_count = children;
        p
    }

    #[test]
    fn payday_uses_per_turn_multiplier() {
        let p = player_with(10_000, 500, 6_200, 2);
        // 10000 + 500 - 6200 - 2*400 = 3500
        assert_eq!(p.payday_amount(CHILD_EXPENSES_PER_TURN), 3_500);
    }

    #[test]
    fn payday_uses_payday_multiplier() {
        let p = player_with(10_000, 500, 6_200, 2);
        // 10000 + 500 - 6200 - 2*1000 = 2300
        assert_eq!(p.payday_amount(CHILD_EXPENSES_PAYDAY), 2_300);
    }

    #[test]
    fn payday_never_negative() {
        let p = player_with(1_000, 0, 6_200, 3);
        assert_eq!(p.payday_amount(CHILD_EXPENSES_PAYDAY), 0);
    }

    #[test]
    fn advance_turn_wraps_and_resets_roll_gate() {
        let mut room = Room::new(
            "test".into(),
            4,
            120,
            &UserRef::new("u1", "alice"),
            10_000,
        );
        room.players
            .push(Player::new(&UserRef::new("u2", "bob"), false, 10_000));
        room.active_index = 1;
        room.has_rolled_this_turn = true;
        room.advance_turn();
        assert_eq!(room.active_index, 0);
        assert!(!room.has_rolled_this_turn);
    }

    #[test]
    fn can_start_needs_ready_quorum() {
        let mut room = Room::new(
            "test".into(),
            4,
            120,
            &UserRef::new("u1", "alice"),
            10_000,
        );
        room.players
            .push(Player::new(&UserRef::new("u2", "bob"), false, 10_000));
        assert!(!room.can_start(2));
        for p in &mut room.players {
            p.is_ready = true;
        }
        assert!(room.can_start(2));
    }
}
