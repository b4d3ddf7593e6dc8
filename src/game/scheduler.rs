//! Turn scheduler: one cancellable deadline per room.
//!
//! A dedicated task owns every armed deadline and is driven by an mpsc
//! command channel; callers interact through a cloneable [`SchedulerHandle`].
//! When a deadline expires the room id is emitted on the outgoing channel and
//! the engine's auto-end-turn path takes over — the scheduler itself never
//! touches room state, so the timer path funnels through the same per-room
//! serialization as request-driven mutations.
//!
//! Arming a room always replaces any existing deadline for it: there is
//! exactly one live timer per room and stale fires cannot stack.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};

/// Internal poll granularity; deadline accuracy is within one tick.
const TICK: Duration = Duration::from_millis(200);

pub enum SchedulerCommand {
    Arm {
        room_id: String,
        duration: Duration,
    },
    Cancel {
        room_id: String,
    },
    TimeLeft {
        room_id: String,
        resp: oneshot::Sender<u64>,
    },
    Snapshot(oneshot::Sender<SchedulerStats>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub armed: usize,
    pub fired_total: u64,
    pub cancelled_total: u64,
}

#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Arm (or re-arm) the deadline for a room. Replaces any armed deadline.
    pub fn arm(&self, room_id: &str, duration: Duration) {
        let _ = self.tx.send(SchedulerCommand::Arm {
            room_id: room_id.to_string(),
            duration,
        });
    }

    pub fn cancel(&self, room_id: &str) {
        let _ = self.tx.send(SchedulerCommand::Cancel {
            room_id: room_id.to_string(),
        });
    }

    /// Whole seconds until the room's deadline, 0 if unarmed.
    pub async fn time_left(&self, room_id: &str) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .tx
            .send(SchedulerCommand::TimeLeft {
                room_id: room_id.to_string(),
                resp: tx,
            })
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub async fn snapshot(&self) -> Option<SchedulerStats> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(SchedulerCommand::Snapshot(tx)).is_ok() {
            rx.await.ok()
        } else {
            None
        }
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(SchedulerCommand::Shutdown(tx));
        let _ = rx.await;
    }
}

/// Spawn the scheduler task. Expired room ids are sent on `expired`; the
/// receiver decides what a fire means (and whether it is stale).
pub fn start_scheduler(expired: mpsc::UnboundedSender<String>) -> SchedulerHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<SchedulerCommand>();
    let handle = SchedulerHandle { tx };

    tokio::spawn(async move {
        let mut deadlines: HashMap<String, Instant> = HashMap::new();
        let mut stats = SchedulerStats::default();
        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::Arm { room_id, duration }) => {
                            if deadlines.insert(room_id.clone(), Instant::now() + duration).is_some() {
                                log::debug!("turn timer re-armed for room {room_id}");
                            }
                        }
                        Some(SchedulerCommand::Cancel { room_id }) => {
                            if deadlines.remove(&room_id).is_some() {
                                stats.cancelled_total += 1;
                            }
                        }
                        Some(SchedulerCommand::TimeLeft { room_id, resp }) => {
                            let now = Instant::now();
                            let left = deadlines
                                .get(&room_id)
                                .map(|d| d.saturating_duration_since(now).as_secs())
                                .unwrap_or(0);
                            let _ = resp.send(left);
                        }
                        Some(SchedulerCommand::Snapshot(resp)) => {
                            let _ = resp.send(SchedulerStats {
                                armed: deadlines.len(),
                                ..stats.clone()
                            });
                        }
                        Some(SchedulerCommand::Shutdown(done)) => {
                            let _ = done.send(());
                            break;
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep(TICK) => {}
            }

            let now = Instant::now();
            let due: Vec<String> = deadlines
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(room_id, _)| room_id.clone())
                .collect();
            for room_id in due {
                deadlines.remove(&room_id);
                stats.fired_total += 1;
                if expired.send(room_id).is_err() {
                    log::warn!("turn expiry channel closed; scheduler stopping");
                    return;
                }
            }
        }
        log::debug!("turn scheduler terminated");
    });

    handle
}
