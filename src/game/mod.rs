//! Game engine: rooms, the board, the turn loop, and the façade tying them
//! to the banking ledger and persistence.

pub mod board;
pub mod cells;
pub mod events;
pub mod registry;
pub mod room;
pub mod scheduler;
pub mod server;

pub use events::{EventSink, GameEvent};
pub use registry::{RoomRegistry, SharedRoom};
pub use room::{Player, Room, RoomStatus, RoomSummary, UserRef};
pub use scheduler::{start_scheduler, SchedulerHandle};
pub use server::{DieRoll, GameServer, MoveOutcome, TransferOutcome};
