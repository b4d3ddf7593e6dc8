//! Board movement engine: dice, modular advancement, lap detection.
//!
//! Movement is pure; the caller applies the resulting [`MovePlan`] to the
//! player and triggers lap paydays and the cell effect for the landing
//! position.

use rand::Rng;
use serde::Serialize;

/// Number of cells on the inner circle.
pub const BOARD_SIZE: usize = 24;

/// Planned movement: the visited cells in order, the landing position, and
/// how many full laps were completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovePlan {
    pub path: Vec<usize>,
    pub new_position: usize,
    pub laps_completed: u32,
}

/// Compute the cells visited by advancing `steps` from `from`.
///
/// The path holds `(from + i) mod BOARD_SIZE` for `i = 1..=steps`; the landing
/// position is the last element. Laps completed is `(from + steps) /
/// BOARD_SIZE` — crossing the start cell always counts, independent of which
/// cells were visited.
pub fn plan_move(from: usize, steps: usize) -> MovePlan {
    debug_assert!(steps > 0, "callers validate steps before planning");
    let path: Vec<usize> = (1..=steps).map(|i| (from + i) % BOARD_SIZE).collect();
    let new_position = *path.last().unwrap_or(&from);
    let laps_completed = ((from + steps) / BOARD_SIZE) as u32;
    MovePlan {
        path,
        new_position,
        laps_completed,
    }
}

/// Roll a single six-sided die.
pub fn roll_die() -> u8 {
    rand::thread_rng().gen_range(1..=6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_around_counts_one_lap() {
        let plan = plan_move(22, 5);
        assert_eq!(plan.path, vec![23, 0, 1, 2, 3]);
        assert_eq!(plan.new_position, 3);
        assert_eq!(plan.laps_completed, 1);
    }

    #[test]
    fn short_move_stays_on_board() {
        let plan = plan_move(0, 6);
        assert_eq!(plan.path, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(plan.new_position, 6);
        assert_eq!(plan.laps_completed, 0);
    }

    #[test]
    fn landing_exactly_on_start_completes_lap() {
        let plan = plan_move(18, 6);
        assert_eq!(plan.new_position, 0);
        assert_eq!(plan.laps_completed, 1);
    }

    #[test]
    fn long_move_completes_multiple_laps() {
        let plan = plan_move(0, 49);
        assert_eq!(plan.new_position, 1);
        assert_eq!(plan.laps_completed, 2);
        assert_eq!(plan.path.len(), 49);
    }

    #[test]
    fn die_is_in_range() {
        for _ in 0..100 {
            let d = roll_die();
            assert!((1..=6).contains(&d));
        }
    }
}
