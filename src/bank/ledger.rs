//! The banking ledger: per-(room, user) balance and loan accounts with an
//! append-only transaction history.
//!
//! The ledger is the single source of truth for money. `Player::cash` is a
//! cached mirror reconciled by [`Ledger::sync`] after every mutating
//! operation and before every balance read, so any divergence window is at
//! most one un-synchronized operation wide.
//!
//! Invariants are enforced by pre-mutation guards: balances and loans never
//! go negative, and a failed guard leaves all state untouched.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::GameError;
use crate::game::room::{NamedLoanKind, Player, CHILD_EXPENSES_PAYDAY, CHILD_EXPENSES_PER_TURN};

/// Step size of the revolving credit line; amounts must be multiples of it.
pub const CREDIT_STEP: i64 = 1_000;

/// Income penalty per credit step taken (restored on repayment).
pub const RATE_PER_STEP: i64 = 100;

/// Counterparty name used in history records for bank-originated flows.
pub const BANK_COUNTERPARTY: &str = "bank";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Transfer,
    CreditTake,
    CreditRepay,
    LoanPayoff,
    Payday,
    InitialDeposit,
}

/// Append-only record of one money movement. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub from: String,
    pub to: String,
    pub amount: i64,
    pub room_id: String,
    pub reason: String,
    pub kind: HistoryKind,
    pub timestamp: DateTime<Utc>,
}

/// What triggered a payday credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaydayReason {
    /// Completed a full lap of the board.
    Lap,
    /// Landed on a payday cell.
    Cell,
}

impl PaydayReason {
    fn describe(&self) -> &'static str {
        match self {
            PaydayReason::Lap => "PAYDAY lap",
            PaydayReason::Cell => "PAYDAY cell",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditOutcome {
    pub loan_amount: i64,
    pub new_balance: i64,
    /// Passive income after the penalty/restoration was applied.
    pub cashflow: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditStatus {
    pub loan_amount: i64,
    pub max_available: i64,
    pub step: i64,
    pub rate_per_step: i64,
}

/// Turn-level financial breakdown (uses the per-turn child multiplier).
#[derive(Debug, Clone, Serialize)]
pub struct FinancialSummary {
    pub salary: i64,
    pub passive_income: i64,
    pub total_income: i64,
    pub base_expenses: i64,
    pub child_expenses: i64,
    pub total_expenses: i64,
    pub net_payday: i64,
    pub loan_amount: i64,
    pub max_available_credit: i64,
}

type AccountKey = (String, String);

#[derive(Default)]
struct LedgerState {
    balances: HashMap<AccountKey, i64>,
    loans: HashMap<AccountKey, i64>,
    history: HashMap<String, Vec<HistoryRecord>>,
}

/// Authoritative balance/loan/history store, one instance per engine.
///
/// Internally a short-lived mutex; no method awaits while holding it, and the
/// per-room serialization above the ledger means calls for the same room
/// never interleave anyway.
pub struct Ledger {
    inner: Mutex<LedgerState>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerState::default()),
        }
    }

    fn key(room_id: &str, user: &str) -> AccountKey {
        (room_id.to_string(), user.to_string())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        // A poisoned ledger mutex means a panic mid-mutation; continuing with
        // the inner state is still the best option for a best-effort game.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get-or-create the balance account, returning its amount.
    pub fn ensure_balance(&self, room_id: &str, user: &str, initial: i64) -> i64 {
        let mut state = self.lock();
        *state
            .balances
            .entry(Self::key(room_id, user))
            .or_insert(initial)
    }

    /// Get-or-create the loan account, returning its amount.
    pub fn ensure_loan(&self, room_id: &str, user: &str) -> i64 {
        let mut state = self.lock();
        *state.loans.entry(Self::key(room_id, user)).or_insert(0)
    }

    pub fn balance(&self, room_id: &str, user: &str) -> i64 {
        let state = self.lock();
        state
            .balances
            .get(&Self::key(room_id, user))
            .copied()
            .unwrap_or(0)
    }

    pub fn loan(&self, room_id: &str, user: &str) -> i64 {
        let state = self.lock();
        state
            .loans
            .get(&Self::key(room_id, user))
            .copied()
            .unwrap_or(0)
    }

    /// Set the balance to an exact amount and record the opening deposit.
    /// Used at game start to grant identical starting savings.
    pub fn open_account_with_deposit(&self, room_id: &str, user: &str, amount: i64) {
        let mut state = self.lock();
        state.balances.insert(Self::key(room_id, user), amount);
        Self::push_history(
            &mut state,
            HistoryRecord {
                from: BANK_COUNTERPARTY.to_string(),
                to: user.to_string(),
                amount,
                room_id: room_id.to_string(),
                reason: "starting savings".to_string(),
                kind: HistoryKind::InitialDeposit,
                timestamp: Utc::now(),
            },
        );
    }

    /// Seed a balance without a history record. Used when rehydrating rooms
    /// at startup, where the persisted `Player::cash` mirror is the only
    /// surviving figure.
    pub fn seed_balance(&self, room_id: &str, user: &str, amount: i64) {
        let mut state = self.lock();
        state.balances.insert(Self::key(room_id, user), amount);
    }

    fn push_history(state: &mut LedgerState, record: HistoryRecord) {
        state
            .history
            .entry(record.room_id.clone())
            .or_default()
            .push(record);
    }

    /// Move `amount` from one balance to another. The sum of both balances
    /// is conserved; a failed guard changes nothing.
    pub fn transfer(
        &self,
        room_id: &str,
        from: &str,
        to: &str,
        amount: i64,
    ) -> Result<(i64, i64), GameError> {
        if amount <= 0 {
            return Err(GameError::InvalidArgument(
                "transfer amount must be positive".to_string(),
            ));
        }
        let mut state = self.lock();
        let from_amount = *state
            .balances
            .entry(Self::key(room_id, from))
            .or_insert(0);
        if from_amount < amount {
            return Err(GameError::InsufficientFunds);
        }
        state.balances.entry(Self::key(room_id, to)).or_insert(0);

        *state.balances.get_mut(&Self::key(room_id, from)).unwrap() -= amount;
        *state.balances.get_mut(&Self::key(room_id, to)).unwrap() += amount;
        let from_balance = state.balances[&Self::key(room_id, from)];
        let to_balance = state.balances[&Self::key(room_id, to)];

        Self::push_history(
            &mut state,
            HistoryRecord {
                from: from.to_string(),
                to: to.to_string(),
                amount,
                room_id: room_id.to_string(),
                reason: "player transfer".to_string(),
                kind: HistoryKind::Transfer,
                timestamp: Utc::now(),
            },
        );
        debug!(
            "transfer: room={} {} -> {} amount={} balances now {}/{}",
            room_id, from, to, amount, from_balance, to_balance
        );
        Ok((from_balance, to_balance))
    }

    /// Credit the player's net payday (payday child multiplier) and mirror it
    /// into `cash`. Returns the credited amount, zero when income does not
    /// cover expenses.
    pub fn apply_payday(&self, room_id: &str, player: &mut Player, reason: PaydayReason) -> i64 {
        let amount = player.payday_amount(CHILD_EXPENSES_PAYDAY);
        if amount == 0 {
            return 0;
        }
        let new_balance = {
            let mut state = self.lock();
            let balance = state
                .balances
                .entry(Self::key(room_id, &player.name))
                .or_insert(player.cash);
            *balance += amount;
            let new_balance = *balance;
            Self::push_history(
                &mut state,
                HistoryRecord {
                    from: BANK_COUNTERPARTY.to_string(),
                    to: player.name.clone(),
                    amount,
                    room_id: room_id.to_string(),
                    reason: reason.describe().to_string(),
                    kind: HistoryKind::Payday,
                    timestamp: Utc::now(),
                },
            );
            new_balance
        };
        player.cash = new_balance;
        player.stats.total_money_earned += amount;
        amount
    }

    /// Income-derived credit ceiling: base net income rounded down to a whole
    /// credit step. The base deliberately ignores any penalty from credit
    /// already taken, so issuing credit cannot compound its own limit
    /// downward.
    pub fn max_available_credit(player: &Player) -> i64 {
        let base_expenses = player.profession.expenses
            + i64::from(player.children_count) * CHILD_EXPENSES_PER_TURN;
        let base_net_income = player.total_income() - base_expenses;
        ((base_net_income / CREDIT_STEP) * CREDIT_STEP).max(0)
    }

    fn require_step_multiple(amount: i64) -> Result<(), GameError> {
        if amount <= 0 {
            return Err(GameError::InvalidArgument(
                "amount must be positive".to_string(),
            ));
        }
        if amount % CREDIT_STEP != 0 {
            return Err(GameError::InvalidArgument(format!(
                "amount must be a multiple of {CREDIT_STEP}"
            )));
        }
        Ok(())
    }

    /// Issue step-based credit: raises the loan account and the balance,
    /// lowers passive income (falling back to salary) by the per-step rate.
    pub fn take_credit(
        &self,
        room_id: &str,
        player: &mut Player,
        amount: i64,
    ) -> Result<CreditOutcome, GameError> {
        Self::require_step_multiple(amount)?;
        let available = Self::max_available_credit(player);
        if amount > available {
            return Err(GameError::LimitExceeded {
                requested: amount,
                available,
            });
        }

        let penalty = (amount / CREDIT_STEP) * RATE_PER_STEP;
        if player.passive_income > 0 {
            player.passive_income = (player.passive_income - penalty).max(0);
        } else {
            player.profession.salary = (player.profession.salary - penalty).max(0);
        }
        player.cash += amount;

        let (loan_amount, new_balance) = {
            let mut state = self.lock();
            let loan = state
                .loans
                .entry(Self::key(room_id, &player.name))
                .or_insert(0);
            *loan += amount;
            let loan_amount = *loan;
            state
                .balances
                .insert(Self::key(room_id, &player.name), player.cash);
            Self::push_history(
                &mut state,
                HistoryRecord {
                    from: BANK_COUNTERPARTY.to_string(),
                    to: player.name.clone(),
                    amount,
                    room_id: room_id.to_string(),
                    reason: "credit issued".to_string(),
                    kind: HistoryKind::CreditTake,
                    timestamp: Utc::now(),
                },
            );
            (loan_amount, player.cash)
        };
        debug!(
            "credit take: room={} user={} amount={} loan={} balance={}",
            room_id, player.name, amount, loan_amount, new_balance
        );
        Ok(CreditOutcome {
            loan_amount,
            new_balance,
            cashflow: player.passive_income,
        })
    }

    /// Repay step-based credit and restore the income penalty exactly.
    pub fn repay_credit(
        &self,
        room_id: &str,
        player: &mut Player,
        amount: i64,
    ) -> Result<CreditOutcome, GameError> {
        Self::require_step_multiple(amount)?;
        let (loan_amount, new_balance) = {
            let mut state = self.lock();
            let outstanding = *state
                .loans
                .entry(Self::key(room_id, &player.name))
                .or_insert(0);
            if amount > outstanding {
                return Err(GameError::LoanExceeded {
                    requested: amount,
                    outstanding,
                });
            }
            let balance = *state
                .balances
                .entry(Self::key(room_id, &player.name))
                .or_insert(player.cash);
            if amount > balance {
                return Err(GameError::InsufficientFunds);
            }

            let loan = state
                .loans
                .get_mut(&Self::key(room_id, &player.name))
                .unwrap();
            *loan -= amount;
            let loan_amount = *loan;
            let balance = state
                .balances
                .get_mut(&Self::key(room_id, &player.name))
                .unwrap();
            *balance -= amount;
            let new_balance = *balance;
            Self::push_history(
                &mut state,
                HistoryRecord {
                    from: player.name.clone(),
                    to: BANK_COUNTERPARTY.to_string(),
                    amount,
                    room_id: room_id.to_string(),
                    reason: "credit repaid".to_string(),
                    kind: HistoryKind::CreditRepay,
                    timestamp: Utc::now(),
                },
            );
            (loan_amount, new_balance)
        };

        player.cash = new_balance;
        let restored = (amount / CREDIT_STEP) * RATE_PER_STEP;
        if player.passive_income > 0 {
            player.passive_income += restored;
        } else {
            player.profession.salary += restored;
        }
        debug!(
            "credit repay: room={} user={} amount={} loan={} balance={}",
            room_id, player.name, amount, loan_amount, new_balance
        );
        Ok(CreditOutcome {
            loan_amount,
            new_balance,
            cashflow: player.passive_income,
        })
    }

    /// Pay off a fixed-origin named loan (car/education/mortgage/credit
    /// cards). Deducts from the balance only; salary and passive income are
    /// untouched.
    pub fn payoff_named_loan(
        &self,
        room_id: &str,
        player: &mut Player,
        kind: NamedLoanKind,
        amount: i64,
    ) -> Result<i64, GameError> {
        if amount <= 0 {
            return Err(GameError::InvalidArgument(
                "payoff amount must be positive".to_string(),
            ));
        }
        if player.named_loan_paid(kind) {
            return Err(GameError::Conflict(format!(
                "{} is already paid off",
                kind.label()
            )));
        }
        let new_balance = {
            let mut state = self.lock();
            let balance = state
                .balances
                .entry(Self::key(room_id, &player.name))
                .or_insert(player.cash);
            if *balance < amount {
                return Err(GameError::InsufficientFunds);
            }
            *balance -= amount;
            let new_balance = *balance;
            Self::push_history(
                &mut state,
                HistoryRecord {
                    from: player.name.clone(),
                    to: BANK_COUNTERPARTY.to_string(),
                    amount,
                    room_id: room_id.to_string(),
                    reason: format!("paid off {}", kind.label()),
                    kind: HistoryKind::LoanPayoff,
                    timestamp: Utc::now(),
                },
            );
            new_balance
        };
        player.cash = new_balance;
        player.named_loans.insert(kind, true);
        Ok(new_balance)
    }

    /// Reconcile the player's cash mirror against the authoritative balance.
    /// Idempotent; returns whether the mirror was adjusted.
    pub fn sync(&self, room_id: &str, player: &mut Player) -> bool {
        let balance = self.ensure_balance(room_id, &player.name, 0);
        if balance != player.cash {
            warn!(
                "balance sync: room={} user={} cash {} -> {} (ledger authoritative)",
                room_id, player.name, player.cash, balance
            );
            player.cash = balance;
            true
        } else {
            false
        }
    }

    pub fn credit_status(&self, room_id: &str, player: &Player) -> CreditStatus {
        CreditStatus {
            loan_amount: self.loan(room_id, &player.name),
            max_available: Self::max_available_credit(player),
            step: CREDIT_STEP,
            rate_per_step: RATE_PER_STEP,
        }
    }

    pub fn financial_summary(&self, room_id: &str, player: &Player) -> FinancialSummary {
        let child_expenses = i64::from(player.children_count) * CHILD_EXPENSES_PER_TURN;
        let total_expenses = player.profession.expenses + child_expenses;
        FinancialSummary {
            salary: player.profession.salary,
            passive_income: player.passive_income,
            total_income: player.total_income(),
            base_expenses: player.profession.expenses,
            child_expenses,
            total_expenses,
            net_payday: player.payday_amount(CHILD_EXPENSES_PER_TURN),
            loan_amount: self.loan(room_id, &player.name),
            max_available_credit: Self::max_available_credit(player),
        }
    }

    /// Last `limit` history records for a room, oldest first.
    pub fn history(&self, room_id: &str, limit: usize) -> Vec<HistoryRecord> {
        let state = self.lock();
        match state.history.get(room_id) {
            Some(records) => {
                let start = records.len().saturating_sub(limit);
                records[start..].to_vec()
            }
            None => Vec::new(),
        }
    }
}
