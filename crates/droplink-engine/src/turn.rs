//! Turn resolution: tile + roll → movement and score change.

use crate::board::{score_delta, Tile, BOARD, LAP_BONUS, TILE_COUNT};
use crate::TileKind;

/// Tile every coin starts on.
pub const START_TILE: u8 = 1;

/// Score every player starts with.
pub const STARTING_SCORE: i32 = 10;

/// The outcome of a single resolved turn.
///
/// `score_delta` includes the lap bonus when a lap was completed but
/// never a chance-card effect: when `draws_chance_card` is set, the
/// caller runs the interactive draw and applies the card's effect
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    pub new_tile: u8,
    pub score_delta: i32,
    pub tile: &'static Tile,
    pub lap_completed: bool,
    pub draws_chance_card: bool,
}

/// Resolves one turn on the circular board.
///
/// Overshooting tile 20 wraps around to tile 1 and earns the fixed
/// [`LAP_BONUS`] on top of whatever the landing tile does. The landing
/// tile's own rules always apply — wrapping never lands "past" the
/// board.
///
/// Deterministic: the same `(current_tile, roll)` always produces the
/// same outcome. The only non-deterministic part of a turn — the chance
/// card — is resolved out-of-band.
pub fn resolve_turn(current_tile: u8, roll: u8) -> TurnOutcome {
    debug_assert!((1..=TILE_COUNT).contains(&current_tile));

    let raw = current_tile as u16 + roll as u16;
    let lap_completed = raw > TILE_COUNT as u16;
    let new_tile = ((raw - 1) % TILE_COUNT as u16 + 1) as u8;

    let tile = &BOARD[new_tile as usize - 1];
    let mut delta = score_delta(tile);
    if lap_completed {
        delta += LAP_BONUS;
    }

    TurnOutcome {
        new_tile,
        score_delta: delta,
        tile,
        lap_completed,
        draws_chance_card: tile.kind == TileKind::Chance,
    }
}

/// A player whose score has run dry is out of the game.
pub fn is_eliminated(score: i32) -> bool {
    score <= 0
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_turn_is_deterministic() {
        for current in 1..=TILE_COUNT {
            for roll in 1..=6 {
                let a = resolve_turn(current, roll);
                let b = resolve_turn(current, roll);
                assert_eq!(a, b, "({current}, {roll}) must be stable");
            }
        }
    }

    #[test]
    fn test_resolve_turn_simple_move_no_lap() {
        // 3 + 4 = 7, Recycled Water (+3), no lap.
        let out = resolve_turn(3, 4);
        assert_eq!(out.new_tile, 7);
        assert_eq!(out.score_delta, 3);
        assert!(!out.lap_completed);
        assert!(!out.draws_chance_card);
    }

    #[test]
    fn test_resolve_turn_from_last_tile_wraps_to_first() {
        // From tile 20 with a roll of 1: land on tile 1, never on a
        // phantom tile 21. Tile 1's own rules apply (Start, delta 0)
        // plus the lap bonus for passing the start.
        let out = resolve_turn(TILE_COUNT, 1);
        assert_eq!(out.new_tile, 1);
        assert!(out.lap_completed);
        assert_eq!(out.score_delta, LAP_BONUS);
        assert_eq!(out.tile.index, 1);
    }

    #[test]
    fn test_resolve_turn_wrap_applies_landing_tile_rules() {
        // 18 + 5 wraps to tile 3 (Polluting Factory, -2); the lap bonus
        // is evaluated on top of the landing tile's own delta.
        let out = resolve_turn(18, 5);
        assert_eq!(out.new_tile, 3);
        assert!(out.lap_completed);
        assert_eq!(out.score_delta, LAP_BONUS - 2);
    }

    #[test]
    fn test_resolve_turn_wrap_past_start_to_tile_four() {
        // 18 + 6 wraps to tile 4 (Flower Garden, +1).
        let out = resolve_turn(18, 6);
        assert_eq!(out.new_tile, 4);
        assert!(out.lap_completed);
        assert_eq!(out.score_delta, LAP_BONUS + 1);
    }

    #[test]
    fn test_resolve_turn_chance_tile_defers_the_card() {
        // 4 + 2 = 6, Marsh Swamp. No card effect is applied inline —
        // the outcome only flags that a draw is owed.
        let out = resolve_turn(4, 2);
        assert_eq!(out.new_tile, 6);
        assert!(out.draws_chance_card);
        assert_eq!(out.score_delta, 0);
    }

    #[test]
    fn test_resolve_turn_disaster_tile() {
        // 4 + 5 = 9, River Robber (-5).
        let out = resolve_turn(4, 5);
        assert_eq!(out.new_tile, 9);
        assert_eq!(out.score_delta, -5);
    }

    #[test]
    fn test_is_eliminated_at_zero_and_below() {
        assert!(!is_eliminated(1));
        assert!(is_eliminated(0));
        assert!(is_eliminated(-3));
    }

    #[test]
    fn test_starting_constants() {
        assert_eq!(START_TILE, 1);
        assert_eq!(STARTING_SCORE, 10);
    }
}
