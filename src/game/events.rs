//! Fire-and-forget notification sink.
//!
//! Gameplay emits events for external transports (websockets, push, chat
//! bridges) to fan out. Delivery is best effort: with no subscribers the send
//! result is discarded, and a slow subscriber only loses its own backlog.

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted {
        room_id: String,
        active_player_id: String,
    },
    TurnChanged {
        room_id: String,
        active_index: usize,
        active_player_id: String,
        /// True when the turn timer expired, false for a manual end-turn.
        auto: bool,
    },
    BalanceChanged {
        room_id: String,
        username: String,
        amount: i64,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<GameEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }

    /// No delivery guarantee; a send with no receivers is fine.
    pub fn emit(&self, event: GameEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(64)
    }
}
