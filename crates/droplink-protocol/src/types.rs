//! Core protocol types for Droplink's wire format.
//!
//! Every message on the link is a flat JSON object carrying a string
//! discriminator — `"command"` for controller → board requests and
//! `"event"` for board → controller messages — plus variant-specific
//! fields. The board firmware's JSON dialect uses snake_case
//! discriminator values and camelCase field names; the serde attributes
//! below reproduce that dialect exactly, so a mismatch here means the
//! firmware cannot parse us (or we reject it).
//!
//! Validation happens at decode time: a message missing its discriminator
//! or missing a required field of the declared variant fails to
//! deserialize and is dropped upstream as a malformed message. Position
//! and score fields are deliberately *required* — an absent value is a
//! protocol error, never silently zero.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's slot index on the board (0-based, stable for a game).
///
/// Newtype over `u8` so a player index can't be confused with a tile
/// index or a dice value in a signature. `#[serde(transparent)]` keeps
/// the wire representation a plain number, which is what the firmware
/// sends and expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Command — controller → board
// ---------------------------------------------------------------------------

/// A request sent from the controller to the board.
///
/// Commands are immutable once constructed and serialized exactly once.
/// There is no command-level retry — if the link drops, reconnection is
/// the session layer's concern, and the game flow decides what (if
/// anything) to resend.
///
/// On the wire: `{ "command": "<variant>", ...fields }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Command {
    /// Authenticate against a password-protected board.
    Pair { password: String },

    /// Configure the board for a new game: how many players, and the
    /// LED color (RRGGBB hex) for each of them.
    Config {
        player_count: u8,
        colors: Vec<String>,
    },

    /// Announce a roll: the board animates the move from `current_tile`
    /// and waits for the coin to land on `expected_tile`.
    Roll {
        player_id: PlayerId,
        player_name: String,
        dice_value: u8,
        current_tile: u8,
        expected_tile: u8,
        color: String,
    },

    /// Revert the most recent move. The board walks the coin guidance
    /// back from `from_tile` to `to_tile` and re-arms placement there.
    Undo {
        player_id: PlayerId,
        from_tile: u8,
        to_tile: u8,
    },

    /// Return the board to its idle/start layout.
    Reset,

    /// Change the board's advertised nickname and/or its pairing
    /// password. Omitted fields are left unchanged.
    UpdateSettings {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
}

impl Command {
    /// Checks the protocol rules that go beyond structure. A command
    /// can deserialize cleanly and still be nonsense the board would
    /// choke on; this is the last gate before bytes leave the
    /// controller.
    ///
    /// Tile indices are 1-based, so 0 is never a valid tile.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] naming the violated rule.
    pub fn validate(&self) -> Result<(), crate::ProtocolError> {
        use crate::ProtocolError::InvalidMessage;

        match self {
            Self::Config {
                player_count,
                colors,
            } => {
                if *player_count == 0 {
                    return Err(InvalidMessage("config with zero players".into()));
                }
                if colors.len() != *player_count as usize {
                    return Err(InvalidMessage(format!(
                        "config for {player_count} players carries {} colors",
                        colors.len()
                    )));
                }
            }

            Self::Roll {
                dice_value,
                current_tile,
                expected_tile,
                ..
            } => {
                if !(1..=6).contains(dice_value) {
                    return Err(InvalidMessage(format!(
                        "dice value {dice_value} out of range"
                    )));
                }
                if *current_tile == 0 || *expected_tile == 0 {
                    return Err(InvalidMessage("tile indices are 1-based".into()));
                }
            }

            Self::Undo {
                from_tile, to_tile, ..
            } => {
                if *from_tile == 0 || *to_tile == 0 {
                    return Err(InvalidMessage("tile indices are 1-based".into()));
                }
            }

            Self::Pair { .. } | Self::Reset | Self::UpdateSettings { .. } => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event — board → controller
// ---------------------------------------------------------------------------

/// A coin movement reported by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub from: u8,
    pub to: u8,
}

/// The tile a move landed on, as the board describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileReport {
    pub name: String,
    /// Tile category name ("BONUS", "PENALTY", ...). `type` on the wire.
    #[serde(rename = "type")]
    pub kind: String,
}

/// A player's score after a processed roll. Both fields are required —
/// a report without them is malformed, not zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub new: i32,
    pub change: i32,
}

/// The score restored by a completed undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredScore {
    pub restored: i32,
}

/// A chance card as reported inside a `roll_processed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChanceCardReport {
    pub number: u8,
    pub description: String,
    pub effect: i32,
}

/// One coin-sensor complaint in a `misplacement` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementIssue {
    pub tile: u8,
    pub issue: String,
}

fn default_verified() -> bool {
    true
}

/// An asynchronous message from the board.
///
/// Events arrive unsolicited on the notification channel; any decoded
/// event — whatever its variant — doubles as a liveness signal for the
/// heartbeat watchdog. On the wire: `{ "event": "<variant>", ...fields }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
    /// The board finished booting / accepted the pairing.
    Ready {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The board processed a roll command and animated the move.
    RollProcessed {
        player_id: PlayerId,
        movement: Movement,
        tile: TileReport,
        score: ScoreReport,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chance_card: Option<ChanceCardReport>,
    },

    /// A coin landed on a tile. `verified` is false when the sensor
    /// detected a coin but could not confirm it was the right one;
    /// older firmware omits the flag entirely, which means verified.
    CoinPlaced {
        player_id: PlayerId,
        tile: u8,
        #[serde(default = "default_verified")]
        verified: bool,
    },

    /// The board gave up waiting for a coin on `tile`.
    CoinTimeout { tile: u8 },

    /// The board reverted the last move and is waiting for the coin at
    /// the restored tile.
    UndoComplete {
        player_id: PlayerId,
        movement: Movement,
        score: RestoredScore,
    },

    /// The coin sensors disagree with the expected layout.
    Misplacement { errors: Vec<PlacementIssue> },

    /// The board applied a `config` command.
    ConfigComplete,

    /// The board applied an `update_settings` command.
    SettingsUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
        #[serde(default)]
        restart_required: bool,
    },

    /// A player's score reached zero; the board retired their coin.
    PlayerEliminated { player_id: PlayerId },

    /// The board declared a winner; the game is over.
    WinnerDeclared { winner_id: PlayerId },
}

// =========================================================================
// Tests
// =========================================================================
