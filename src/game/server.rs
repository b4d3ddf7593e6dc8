//! The game engine façade.
//!
//! [`GameServer`] owns the room registry, the banking ledger, the turn
//! scheduler, and the persistence writer, and exposes every operation the
//! routing layer calls. All mutation of a room goes through that room's
//! mutex — the turn-timer expiry path included — so no two mutations of the
//! same room ever interleave. Persistence is a fire-and-forget snapshot
//! queued after the mutation, outside any lock-sensitive work.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::bank::ledger::{CreditOutcome, CreditStatus, FinancialSummary, HistoryRecord, Ledger};
use crate::config::Config;
use crate::errors::GameError;
use crate::game::board;
use crate::game::cells::{self, CellEffect};
use crate::game::events::{EventSink, GameEvent};
use crate::game::registry::{RoomRegistry, SharedRoom};
use crate::game::room::{
    LastRoll, NamedLoanKind, Player, Room, RoomStatus, RoomSummary, UserRef,
};
use crate::game::scheduler::{start_scheduler, SchedulerHandle};
use crate::storage::{start_writer, RoomStore, StoreHandle};

/// Result of a die roll.
#[derive(Debug, Clone, Serialize)]
pub struct DieRoll {
    pub die: u8,
}

/// Result of moving the active player.
#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub from: usize,
    pub path: Vec<usize>,
    pub new_position: usize,
    pub laps_completed: u32,
    /// Total payday credited for completed laps.
    pub payday_bonus: i64,
    pub effect: CellEffect,
}

/// Balances of both parties after a transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub from_balance: i64,
    pub to_balance: i64,
}

pub struct GameServer {
    config: Config,
    registry: RoomRegistry,
    ledger: Ledger,
    scheduler: SchedulerHandle,
    store: StoreHandle,
    events: EventSink,
}

impl GameServer {
    /// Bring the engine up: open the tiered store, rehydrate persisted rooms,
    /// start the turn scheduler and the persistence writer, and wire the
    /// timer-expiry path back into the engine.
    pub async fn start(config: Config) -> Result<Arc<Self>> {
        let room_store = RoomStore::open_tiered(Path::new(&config.storage.data_dir));
        let rooms = match room_store.load_all().await {
            Ok(rooms) => rooms,
            Err(e) => {
                warn!("room rehydration failed ({e}); starting empty");
                Vec::new()
            }
        };

        let registry = RoomRegistry::new();
        let ledger = Ledger::new();
        let mut playing: Vec<(String, u64)> = Vec::new();
        for room in rooms {
            // Bank state is not persisted; the cash mirror is the only
            // surviving figure, so it seeds the authoritative balance.
            for player in &room.players {
                ledger.seed_balance(&room.id, &player.name, player.cash);
            }
            if room.status == RoomStatus::Playing {
                playing.push((room.id.clone(), room.turn_time_secs));
            }
            registry.insert(room).await;
        }
        info!(
            "rehydrated {} room(s) from {} store",
            registry.len().await,
            room_store.backend_name()
        );

        let (expired_tx, mut expired_rx) = mpsc::unbounded_channel();
        let scheduler = start_scheduler(expired_tx);
        for (room_id, turn_time) in playing {
            scheduler.arm(&room_id, Duration::from_secs(turn_time));
        }
        let store = start_writer(Arc::new(room_store));

        let server = Arc::new(Self {
            config,
            registry,
            ledger,
            scheduler,
            store,
            events: EventSink::default(),
        });

        let engine = server.clone();
        tokio::spawn(async move {
            while let Some(room_id) = expired_rx.recv().await {
                engine.auto_end_turn(&room_id).await;
            }
        });

        Ok(server)
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    async fn room(&self, room_id: &str) -> Result<SharedRoom, GameError> {
        self.registry
            .get(room_id)
            .await
            .ok_or_else(|| GameError::NotFound(format!("room {room_id}")))
    }

    /// Index of the active player iff `requester` owns the turn.
    fn require_active(room: &Room, requester: &str) -> Result<usize, GameError> {
        let active = room
            .active_player()
            .ok_or_else(|| GameError::Internal("room has no players".to_string()))?;
        if active.user_id != requester {
            return Err(GameError::Forbidden("not your turn".to_string()));
        }
        Ok(room.active_index)
    }

    // ---- Lobby ----------------------------------------------------------

    pub async fn create_room(
        &self,
        name: &str,
        max_players: usize,
        turn_time_secs: Option<u64>,
        creator: &UserRef,
    ) -> Result<Room, GameError> {
        let name = name.trim();
        if name.len() < 3 || name.len() > 48 {
            return Err(GameError::InvalidArgument(
                "room name must be 3-48 characters".to_string(),
            ));
        }
        if max_players < self.config.game.min_players
            || max_players > self.config.game.max_players_limit
        {
            return Err(GameError::InvalidArgument(format!(
                "max_players must be between {} and {}",
                self.config.game.min_players, self.config.game.max_players_limit
            )));
        }
        let turn_time = turn_time_secs
            .unwrap_or(self.config.game.default_turn_time_secs)
            .max(self.config.game.min_turn_time_secs);

        let room = Room::new(
            name.to_string(),
            max_players,
            turn_time,
            creator,
            self.config.game.starting_cash,
        );
        let snapshot = room.clone();
        self.registry.insert(room).await;
        info!("room {} ({}) created by {}", snapshot.id, name, creator.name);
        self.store.save(snapshot.clone());
        Ok(snapshot)
    }

    pub async fn join_room(&self, room_id: &str, user: &UserRef) -> Result<Room, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        if room.player_by_id(&user.id).is_some() {
            // Re-join is a no-op.
            return Ok(room.clone());
        }
        if room.status != RoomStatus::Waiting {
            return Err(GameError::Conflict("game already in progress".to_string()));
        }
        if room.is_full() {
            return Err(GameError::Conflict("room is full".to_string()));
        }
        room.players
            .push(Player::new(user, false, self.config.game.starting_cash));
        room.touch();
        info!("{} joined room {}", user.name, room_id);
        self.store.save(room.clone());
        Ok(room.clone())
    }

    pub async fn set_ready(
        &self,
        room_id: &str,
        user_id: &str,
        ready: bool,
    ) -> Result<Room, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        let player = room
            .player_mut_by_id(user_id)
            .ok_or_else(|| GameError::NotFound(format!("player {user_id}")))?;
        player.is_ready = ready;
        room.touch();
        self.store.save(room.clone());
        Ok(room.clone())
    }

    pub async fn select_token(
        &self,
        room_id: &str,
        user_id: &str,
        token: &str,
    ) -> Result<Room, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        let taken = room
            .players
            .iter()
            .any(|p| p.user_id != user_id && p.selected_token.as_deref() == Some(token));
        if taken {
            return Err(GameError::Conflict(format!(
                "token {token} is already taken"
            )));
        }
        let player = room
            .player_mut_by_id(user_id)
            .ok_or_else(|| GameError::NotFound(format!("player {user_id}")))?;
        player.selected_token = Some(token.to_string());
        room.touch();
        self.store.save(room.clone());
        Ok(room.clone())
    }

    pub async fn select_dream(
        &self,
        room_id: &str,
        user_id: &str,
        dream: &str,
    ) -> Result<Room, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        let player = room
            .player_mut_by_id(user_id)
            .ok_or_else(|| GameError::NotFound(format!("player {user_id}")))?;
        player.selected_dream = Some(dream.to_string());
        room.touch();
        self.store.save(room.clone());
        Ok(room.clone())
    }

    /// Start the game: host-only, needs a ready quorum. Picks a random first
    /// player, credits the starting savings to every player through the
    /// ledger, and arms the turn timer.
    pub async fn start_game(&self, room_id: &str, requester: &str) -> Result<Room, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;

        let host = room
            .players
            .first()
            .ok_or_else(|| GameError::Internal("room has no players".to_string()))?;
        if host.user_id != requester {
            return Err(GameError::Forbidden(
                "only the room creator can start the game".to_string(),
            ));
        }
        if room.status != RoomStatus::Waiting {
            return Err(GameError::Conflict("game already started".to_string()));
        }
        if !room.can_start(self.config.game.min_players) {
            return Err(GameError::InvalidArgument(
                "not enough ready players".to_string(),
            ));
        }

        room.status = RoomStatus::Playing;
        room.active_index = rand::thread_rng().gen_range(0..room.players.len());
        room.has_rolled_this_turn = false;

        let deposit = self.config.game.initial_deposit;
        let id = room.id.clone();
        for player in &mut room.players {
            player.position = 0;
            if player.passive_income < 0 {
                player.passive_income = 0;
            }
            self.ledger
                .open_account_with_deposit(&id, &player.name, deposit);
            player.cash = deposit;
        }
        room.touch();

        self.scheduler
            .arm(&room.id, Duration::from_secs(room.turn_time_secs));
        let snapshot = room.clone();
        drop(room);

        info!(
            "game started in room {} with {} players",
            room_id,
            snapshot.players.len()
        );
        self.store.save(snapshot.clone());
        if let Some(active) = snapshot.active_player() {
            self.events.emit(GameEvent::GameStarted {
                room_id: room_id.to_string(),
                active_player_id: active.user_id.clone(),
            });
        }
        Ok(snapshot)
    }

    // ---- Turn loop ------------------------------------------------------

    /// Roll the die. Exactly one roll per turn cycle.
    pub async fn roll(&self, room_id: &str, requester: &str) -> Result<DieRoll, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        let idx = Self::require_active(&room, requester)?;
        if room.has_rolled_this_turn {
            return Err(GameError::Conflict(
                "die already rolled this turn".to_string(),
            ));
        }

        let die = board::roll_die();
        room.has_rolled_this_turn = true;
        room.last_roll = Some(LastRoll {
            player_id: requester.to_string(),
            die,
            rolled_at: chrono::Utc::now(),
        });
        room.players[idx].stats.dice_rolled += 1;
        room.touch();
        Ok(DieRoll { die })
    }

    /// Advance the active player. Completed laps each pay a full payday;
    /// only the landing cell's effect is dispatched.
    pub async fn move_player(
        &self,
        room_id: &str,
        requester: &str,
        steps: u32,
    ) -> Result<MoveOutcome, GameError> {
        if steps == 0 {
            return Err(GameError::InvalidArgument(
                "steps must be a positive integer".to_string(),
            ));
        }
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        let idx = Self::require_active(&room, requester)?;

        let plan;
        let from;
        let payday_bonus;
        let effect;
        {
            let id = room.id.clone();
            let player = &mut room.players[idx];
            from = player.position;
            plan = board::plan_move(from, steps as usize);
            player.position = plan.new_position;
            player.stats.total_moves += steps;

            let mut bonus = 0;
            if plan.laps_completed > 0 {
                for _ in 0..plan.laps_completed {
                    bonus += self
                        .ledger
                        .apply_payday(&id, player, crate::bank::PaydayReason::Lap);
                }
                player.stats.times_passed_go += plan.laps_completed;
            }
            payday_bonus = bonus;
            effect = cells::apply_cell_effect(&self.ledger, &id, player);
        }
        room.touch();
        let snapshot = room.clone();
        drop(room);

        self.store.save(snapshot.clone());
        if payday_bonus > 0 {
            self.events.emit(GameEvent::BalanceChanged {
                room_id: room_id.to_string(),
                username: snapshot.players[idx].name.clone(),
                amount: payday_bonus,
                reason: "PAYDAY lap".to_string(),
            });
        }
        Ok(MoveOutcome {
            from,
            path: plan.path,
            new_position: plan.new_position,
            laps_completed: plan.laps_completed,
            payday_bonus,
            effect,
        })
    }

    /// Manual end of turn by the active player.
    pub async fn end_turn(&self, room_id: &str, requester: &str) -> Result<Room, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        Self::require_active(&room, requester)?;

        room.advance_turn();
        self.scheduler
            .arm(&room.id, Duration::from_secs(room.turn_time_secs));
        let snapshot = room.clone();
        drop(room);

        self.store.save(snapshot.clone());
        self.emit_turn_changed(&snapshot, false);
        Ok(snapshot)
    }

    /// Timer-expiry path: advance the turn on behalf of an idle player.
    /// Idempotent against stale fires — a missing or no-longer-playing room
    /// just cancels the timer.
    pub async fn auto_end_turn(&self, room_id: &str) {
        let Some(handle) = self.registry.get(room_id).await else {
            self.scheduler.cancel(room_id);
            return;
        };
        let mut room = handle.lock().await;
        if room.status != RoomStatus::Playing {
            self.scheduler.cancel(room_id);
            return;
        }

        room.advance_turn();
        self.scheduler
            .arm(&room.id, Duration::from_secs(room.turn_time_secs));
        let snapshot = room.clone();
        drop(room);

        info!(
            "turn timer expired in room {}, active player is now index {}",
            room_id, snapshot.active_index
        );
        self.store.save(snapshot.clone());
        self.emit_turn_changed(&snapshot, true);
    }

    fn emit_turn_changed(&self, room: &Room, auto: bool) {
        if let Some(active) = room.active_player() {
            self.events.emit(GameEvent::TurnChanged {
                room_id: room.id.clone(),
                active_index: room.active_index,
                active_player_id: active.user_id.clone(),
                auto,
            });
        }
    }

    /// Whole seconds left on the room's turn timer (0 if unarmed).
    pub async fn turn_time_left(&self, room_id: &str) -> u64 {
        self.scheduler.time_left(room_id).await
    }

    // ---- Banking --------------------------------------------------------

    pub async fn transfer_funds(
        &self,
        room_id: &str,
        from: &str,
        to: &str,
        amount: i64,
    ) -> Result<TransferOutcome, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        let (from_balance, to_balance) = self.ledger.transfer(room_id, from, to, amount)?;
        for name in [from, to] {
            if let Some(player) = room.player_mut_by_name(name) {
                self.ledger.sync(room_id, player);
            }
        }
        drop(room);

        self.events.emit(GameEvent::BalanceChanged {
            room_id: room_id.to_string(),
            username: to.to_string(),
            amount,
            reason: format!("transfer from {from}"),
        });
        Ok(TransferOutcome {
            from_balance,
            to_balance,
        })
    }

    pub async fn take_credit(
        &self,
        room_id: &str,
        username: &str,
        amount: i64,
    ) -> Result<CreditOutcome, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        let player = room
            .player_mut_by_name(username)
            .ok_or_else(|| GameError::NotFound(format!("player {username}")))?;
        let outcome = self.ledger.take_credit(room_id, player, amount)?;
        drop(room);

        self.events.emit(GameEvent::BalanceChanged {
            room_id: room_id.to_string(),
            username: username.to_string(),
            amount,
            reason: "credit issued".to_string(),
        });
        Ok(outcome)
    }

    pub async fn repay_credit(
        &self,
        room_id: &str,
        username: &str,
        amount: i64,
    ) -> Result<CreditOutcome, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        let player = room
            .player_mut_by_name(username)
            .ok_or_else(|| GameError::NotFound(format!("player {username}")))?;
        let outcome = self.ledger.repay_credit(room_id, player, amount)?;
        drop(room);

        self.events.emit(GameEvent::BalanceChanged {
            room_id: room_id.to_string(),
            username: username.to_string(),
            amount: -amount,
            reason: "credit repaid".to_string(),
        });
        Ok(outcome)
    }

    pub async fn payoff_named_loan(
        &self,
        room_id: &str,
        username: &str,
        kind: NamedLoanKind,
        amount: i64,
    ) -> Result<i64, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        let player = room
            .player_mut_by_name(username)
            .ok_or_else(|| GameError::NotFound(format!("player {username}")))?;
        let balance = self.ledger.payoff_named_loan(room_id, player, kind, amount)?;
        room.touch();
        let snapshot = room.clone();
        drop(room);

        self.store.save(snapshot);
        Ok(balance)
    }

    /// Ledger balance for a user, reconciling the cash mirror first.
    pub async fn get_balance(&self, room_id: &str, username: &str) -> Result<i64, GameError> {
        let handle = self.room(room_id).await?;
        let mut room = handle.lock().await;
        if let Some(player) = room.player_mut_by_name(username) {
            self.ledger.sync(room_id, player);
        }
        Ok(self.ledger.ensure_balance(room_id, username, 0))
    }

    pub async fn credit_status(
        &self,
        room_id: &str,
        username: &str,
    ) -> Result<CreditStatus, GameError> {
        let handle = self.room(room_id).await?;
        let room = handle.lock().await;
        let player = room
            .player_by_name(username)
            .ok_or_else(|| GameError::NotFound(format!("player {username}")))?;
        Ok(self.ledger.credit_status(room_id, player))
    }

    pub async fn financial_summary(
        &self,
        room_id: &str,
        username: &str,
    ) -> Result<FinancialSummary, GameError> {
        let handle = self.room(room_id).await?;
        let room = handle.lock().await;
        let player = room
            .player_by_name(username)
            .ok_or_else(|| GameError::NotFound(format!("player {username}")))?;
        Ok(self.ledger.financial_summary(room_id, player))
    }

    /// Last `limit` history records for the room, oldest first.
    pub async fn get_history(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, GameError> {
        self.room(room_id).await?;
        Ok(self.ledger.history(room_id, limit))
    }

    // ---- Queries --------------------------------------------------------

    pub async fn get_room(&self, room_id: &str) -> Result<Room, GameError> {
        let handle = self.room(room_id).await?;
        let room = handle.lock().await;
        Ok(room.clone())
    }

    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        self.registry.summaries().await
    }

    pub async fn room_count(&self) -> usize {
        self.registry.len().await
    }
}
