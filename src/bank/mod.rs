//! Banking: the authoritative ledger, the step-based credit line, named-loan
//! payoff, and the balance synchronizer that keeps `Player::cash` mirroring
//! the ledger.

pub mod ledger;

pub use ledger::{
    CreditOutcome, CreditStatus, FinancialSummary, HistoryKind, HistoryRecord, Ledger,
    PaydayReason, BANK_COUNTERPARTY, CREDIT_STEP, RATE_PER_STEP,
};
