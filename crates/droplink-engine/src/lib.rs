//! Pure game rules for the 20-tile circular board.
//!
//! This crate is deliberately free of any link, async, or I/O concern:
//! given a current tile and a dice roll it computes where the coin goes
//! and what the score does. The orchestration layer owns talking to the
//! physical board; it calls in here to know what *should* happen, then
//! compares that against what the board reports.
//!
//! Tile deltas and the chance deck are game balance — the tables in
//! [`board`] and [`cards`] are the single source of truth and are pinned
//! by tests.

mod board;
mod cards;
mod turn;

pub use board::{score_delta, tile, Tile, TileKind, BOARD, LAP_BONUS, TILE_COUNT};
pub use cards::{draw_chance_card, ChanceCard, CHANCE_DECK};
pub use turn::{is_eliminated, resolve_turn, TurnOutcome, START_TILE, STARTING_SCORE};
