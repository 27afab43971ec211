//! The board layout: twenty tiles, their categories, and score deltas.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

/// What kind of tile this is.
///
/// Serialized in SCREAMING_SNAKE_CASE because that is how the board
/// firmware names tile types in its reports ("WATER_DOCK", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TileKind {
    Start,
    /// No effect.
    Normal,
    Chance,
    /// Small bonus.
    Bonus,
    /// Small penalty.
    Penalty,
    /// Major penalty.
    Disaster,
    /// Water collection — major resource bonus.
    WaterDock,
    /// Largest bonus; unused in the current layout but kept because the
    /// firmware still knows the type.
    SuperDock,
}

impl TileKind {
    /// The firmware's name for this tile type.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Normal => "NORMAL",
            Self::Chance => "CHANCE",
            Self::Bonus => "BONUS",
            Self::Penalty => "PENALTY",
            Self::Disaster => "DISASTER",
            Self::WaterDock => "WATER_DOCK",
            Self::SuperDock => "SUPER_DOCK",
        }
    }
}

/// One tile on the board. `index` is the 1-based position printed on the
/// physical board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub index: u8,
    pub name: &'static str,
    pub kind: TileKind,
}

const fn t(index: u8, name: &'static str, kind: TileKind) -> Tile {
    Tile { index, name, kind }
}

/// The full 20-tile layout. Order matches the physical board; the tile
/// at `BOARD[i]` has index `i + 1`.
pub const BOARD: [Tile; 20] = [
    t(1, "Launch Pad", TileKind::Start),
    t(2, "Nature Guardian", TileKind::Bonus),
    t(3, "Polluting Factory", TileKind::Penalty),
    t(4, "Flower Garden", TileKind::Bonus),
    t(5, "Tree Cutting", TileKind::Disaster),
    t(6, "Marsh Swamp", TileKind::Chance),
    t(7, "Recycled Water", TileKind::WaterDock),
    t(8, "Wasted Water", TileKind::Penalty),
    t(9, "River Robber", TileKind::Disaster),
    t(10, "Lilly Pond", TileKind::Bonus),
    t(11, "Sanctuary Cove", TileKind::Chance),
    t(12, "Shrinking Lake", TileKind::Disaster),
    t(13, "Crystal Glacier", TileKind::Bonus),
    t(14, "Dry City", TileKind::Penalty),
    t(15, "Rain Harvest", TileKind::Bonus),
    t(16, "Mangrove Trail", TileKind::Chance),
    t(17, "Wasted Well", TileKind::Penalty),
    t(18, "Evergreen Forest", TileKind::WaterDock),
    t(19, "Plant Grower", TileKind::Bonus),
    t(20, "Dirty Water Lane", TileKind::Penalty),
];

/// Number of tiles on the board.
pub const TILE_COUNT: u8 = BOARD.len() as u8;

/// Score bonus for completing a lap (passing the start tile).
pub const LAP_BONUS: i32 = 5;

/// Looks up a tile by its 1-based board position.
pub fn tile(index: u8) -> Option<&'static Tile> {
    if (1..=TILE_COUNT).contains(&index) {
        Some(&BOARD[index as usize - 1])
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Score deltas
// ---------------------------------------------------------------------------

/// The score change for landing on a tile.
///
/// Each category has a default delta, and several tiles override it.
/// This table is game balance — change it and printed rulebooks are
/// wrong, so the match arms below list the overriding tiles explicitly.
///
/// Chance tiles contribute 0 here: the card is drawn out-of-band and
/// reports its own effect later.
pub fn score_delta(tile: &Tile) -> i32 {
    match tile.kind {
        TileKind::Start | TileKind::Normal | TileKind::Chance => 0,

        TileKind::Bonus => match tile.index {
            13 | 15 => 2, // Crystal Glacier, Rain Harvest
            _ => 1,       // Nature Guardian, Flower Garden, Lilly Pond, Plant Grower
        },

        TileKind::Penalty => match tile.index {
            8 => -1, // Wasted Water
            _ => -2, // Polluting Factory, Dry City, Wasted Well, Dirty Water Lane
        },

        TileKind::Disaster => match tile.index {
            9 => -5,  // River Robber
            12 => -4, // Shrinking Lake
            _ => -3,  // Tree Cutting
        },

        TileKind::WaterDock => match tile.index {
            18 => 4, // Evergreen Forest
            _ => 3,  // Recycled Water
        },

        TileKind::SuperDock => 4,
    }
}

// =========================================================================
// Tests
// =========================================================================
