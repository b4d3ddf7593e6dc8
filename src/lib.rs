//! ratrace — a turn-based economic board game engine.
//!
//! The engine hosts multiplayer rooms on a 24-cell board: players roll a die,
//! advance, collect paydays, and move money through a banking ledger that is
//! the single source of truth for balances, step-based credit, and the
//! transaction history. A server-side turn scheduler auto-advances idle
//! players, and room snapshots are persisted best-effort through a tiered
//! sled/JSON/memory store.
//!
//! Entry point for embedders is [`game::GameServer`].

pub mod bank;
pub mod config;
pub mod errors;
pub mod game;
pub mod storage;

pub use errors::GameError;
pub use game::GameServer;
