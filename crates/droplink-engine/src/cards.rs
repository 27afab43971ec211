//! The chance-card deck.
//!
//! Landing on a chance tile does not resolve a card inside
//! [`resolve_turn`](crate::resolve_turn) — card selection is an
//! interactive step (the player draws on screen), and the drawn card's
//! effect is applied to the score afterwards. This module holds the deck
//! itself plus the draw helper that interactive step uses.

use rand::Rng;

/// One chance card. `effect` is the score change; special cards (skip,
/// move, swap, shield) carry effect 0 and are interpreted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChanceCard {
    pub number: u8,
    pub description: &'static str,
    pub effect: i32,
}

const fn card(number: u8, description: &'static str, effect: i32) -> ChanceCard {
    ChanceCard {
        number,
        description,
        effect,
    }
}

/// The full 20-card deck from the rulebook's elimination mode.
pub const CHANCE_DECK: [ChanceCard; 20] = [
    card(1, "Fixed tap leak", 2),
    card(2, "Rain harvested", 2),
    card(3, "Planted trees", 1),
    card(4, "Clouds formed", 1),
    card(5, "Preserved riverbank", 2),
    card(6, "Cleaned well", 2),
    card(7, "Saved plant", 1),
    card(8, "Recycled water", 1),
    card(9, "Bucket bath", 2),
    card(10, "Drip irrigation", 2),
    card(11, "Skip penalty", 0),    // immunity
    card(12, "Move forward 2", 0),  // movement
    card(13, "Swap with next", 0),  // next player plays twice
    card(14, "Water Shield", 0),    // immunity
    card(15, "Left tap running", -1),
    card(16, "Bottle spilled", -1),
    card(17, "Pipe burst", -3),
    card(18, "Climate dries water", -2),
    card(19, "Sewage contamination", -2),
    card(20, "Wasted papers", -3),
];

/// Draws a uniformly random card from the deck.
pub fn draw_chance_card() -> &'static ChanceCard {
    let index = rand::rng().random_range(0..CHANCE_DECK.len());
    &CHANCE_DECK[index]
}

// =========================================================================
// Tests
// =========================================================================
