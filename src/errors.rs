use thiserror::Error;

/// Errors reported by game and banking operations.
///
/// Every variant except [`GameError::Internal`] is an expected, recoverable
/// condition the caller can act on. `Internal` is a catch-all that never
/// carries more than a message.
#[derive(Debug, Error)]
pub enum GameError {
    /// Room, player, or account is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Requester is not allowed to perform the operation (wrong turn owner,
    /// non-host starting the game).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Operation clashes with current state (duplicate roll, full room,
    /// already-paid loan).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed input (non-positive amount, bad step count, invalid name).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Sender balance is below the requested debit.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Requested credit exceeds the income-derived ceiling.
    #[error("credit limit exceeded: requested {requested}, available {available}")]
    LimitExceeded { requested: i64, available: i64 },

    /// Repayment larger than the outstanding step loan.
    #[error("repayment exceeds outstanding loan: {requested} > {outstanding}")]
    LoanExceeded { requested: i64, outstanding: i64 },

    /// Unexpected internal fault; details stay server-side.
    #[error("internal error: {0}")]
    Internal(String),
}
