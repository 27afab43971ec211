//! Notices: what the core reports to its collaborators.
//!
//! The UI, live-state push, and commentary layers all consume this one
//! stream. It is delivered on an unbounded channel so that a stalled
//! collaborator can never stall the link pipeline.

use droplink_engine::TileKind;
use droplink_protocol::{ChanceCardReport, PlacementIssue, PlayerId};
use droplink_session::{DisconnectCause, LinkState};

/// One resolved turn, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    pub player: PlayerId,
    pub from_tile: u8,
    pub to_tile: u8,
    /// Score change including the lap bonus and any reported chance
    /// card effect.
    pub score_delta: i32,
    /// The player's new total.
    pub score: i32,
    pub tile_name: &'static str,
    pub tile_kind: TileKind,
    pub lap_completed: bool,
    pub chance_card: Option<ChanceCardReport>,
}

/// Outbound notifications from the core.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardNotice {
    /// The link moved through its lifecycle.
    LinkStateChanged(LinkState),

    /// The link went down — exactly one notice per underlying loss,
    /// tagged with the cause so consumers can deduplicate.
    ConnectionLost { cause: DisconnectCause },

    /// Automatic reconnects are spent; the user decides what happens
    /// next (retry or continue offline).
    ConnectionExhausted,

    /// The board accepted the game configuration; the game is on.
    BoardConfigured,

    /// A roll completed on the board.
    TurnResolved(TurnSummary),

    /// The coin landed. `verified: false` is a non-fatal warning — the
    /// sensor saw a coin but could not confirm it.
    CoinConfirmation { tile: u8, verified: bool },

    /// The board stopped waiting for a coin; the game moved on anyway.
    PlacementTimeout { tile: u8 },

    /// The sensors disagree with the expected layout; the board keeps
    /// waiting for the player to fix it.
    Misplacement { errors: Vec<PlacementIssue> },

    /// An undo went through; the reverted player goes again.
    UndoApplied {
        player: PlayerId,
        restored_tile: u8,
        restored_score: i32,
    },

    PlayerEliminated(PlayerId),

    WinnerDeclared(PlayerId),

    /// The two state copies diverged past the threshold. Resolution is
    /// an explicit user decision, never automatic.
    ReconciliationFailure { message: String },

    /// The board acknowledged a settings change.
    SettingsUpdated {
        nickname: Option<String>,
        restart_required: bool,
    },
}
