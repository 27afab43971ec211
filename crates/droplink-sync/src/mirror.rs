//! The controller's per-player state copies.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use droplink_protocol::PlayerId;

/// One player's position and score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerState {
    /// 1-based tile index.
    pub position: u8,
    pub score: i32,
}

/// A map of player → (position, score).
///
/// Used for both copies of the truth: the controller's local belief and
/// the most recently board-reported values. Which copy wins a
/// disagreement is never decided here.
#[derive(Debug, Clone, Default)]
pub struct StateMirror {
    entries: HashMap<PlayerId, PlayerState>,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a player's state, replacing any previous entry.
    pub fn record(&mut self, player: PlayerId, position: u8, score: i32) {
        self.entries.insert(player, PlayerState { position, score });
    }

    pub fn get(&self, player: PlayerId) -> Option<PlayerState> {
        self.entries.get(&player).copied()
    }

    /// Forgets everything. Used by a "trust remote" resolution and by a
    /// game reset.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, PlayerState)> + '_ {
        self.entries.iter().map(|(id, state)| (*id, *state))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The local mirror behind a lock: one writer (the orchestrator), any
/// number of readers. Nothing holds the lock across an await.
pub type SharedMirror = Arc<RwLock<StateMirror>>;

/// The board's most recently reported state, stamped with when the last
/// report arrived so the reconciler can tell "diverged" from "silent".
#[derive(Debug, Default)]
pub struct BoardReported {
    state: StateMirror,
    last_update: Option<Instant>,
}

impl BoardReported {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a board-reported value and refreshes the freshness stamp.
    pub fn record(&mut self, player: PlayerId, position: u8, score: i32) {
        self.state.record(player, position, score);
        self.last_update = Some(Instant::now());
    }

    pub fn state(&self) -> &StateMirror {
        &self.state
    }

    /// Time since the board last reported anything, if it ever has.
    pub fn since_last_update(&self) -> Option<std::time::Duration> {
        self.last_update.map(|at| at.elapsed())
    }

    pub fn clear(&mut self) {
        self.state.clear();
        self.last_update = None;
    }
}

pub type SharedReported = Arc<RwLock<BoardReported>>;

// =========================================================================
// Tests
// =========================================================================
