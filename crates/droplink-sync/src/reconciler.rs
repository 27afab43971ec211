//! The periodic consistency check and its escalation policy.

use std::time::Duration;

use droplink_protocol::PlayerId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::{SharedMirror, SharedReported, StateMirror};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for the reconciler.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often the two state copies are compared.
    pub interval: Duration,

    /// Consecutive failed checks before a failure is raised. A single
    /// clean check resets the count.
    pub failure_threshold: u32,

    /// How long the board may go without reporting anything mid-game
    /// before a warning is logged. Silence is only logged here — it is
    /// the heartbeat watchdog's job, not a mismatch.
    pub quiet_warning: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            failure_threshold: 3,
            quiet_warning: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// One field that disagrees between the two copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub player: PlayerId,
    pub local: i32,
    pub reported: i32,
}

/// Result of one consistency check. Transient — produced, inspected,
/// and discarded each round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub in_sync: bool,
    pub position_mismatches: Vec<FieldMismatch>,
    pub score_mismatches: Vec<FieldMismatch>,
}

impl SyncResult {
    fn synced() -> Self {
        Self {
            in_sync: true,
            position_mismatches: Vec::new(),
            score_mismatches: Vec::new(),
        }
    }
}

/// Compares the local belief against the board-reported copy.
///
/// Equality is exact per field — positions and scores are discrete, so
/// there is no tolerance band. Only players present in *both* copies are
/// compared: a player the board hasn't reported yet is not a mismatch.
pub fn compare(local: &StateMirror, reported: &StateMirror) -> SyncResult {
    let mut position_mismatches = Vec::new();
    let mut score_mismatches = Vec::new();

    for (player, local_state) in local.iter() {
        let Some(reported_state) = reported.get(player) else {
            continue;
        };
        if reported_state.position != local_state.position {
            position_mismatches.push(FieldMismatch {
                player,
                local: local_state.position as i32,
                reported: reported_state.position as i32,
            });
        }
        if reported_state.score != local_state.score {
            score_mismatches.push(FieldMismatch {
                player,
                local: local_state.score,
                reported: reported_state.score,
            });
        }
    }

    if position_mismatches.is_empty() && score_mismatches.is_empty() {
        SyncResult::synced()
    } else {
        SyncResult {
            in_sync: false,
            position_mismatches,
            score_mismatches,
        }
    }
}

// ---------------------------------------------------------------------------
// Escalation
// ---------------------------------------------------------------------------

/// Counts consecutive failed checks and decides when to raise.
#[derive(Debug)]
pub struct FailureCounter {
    consecutive: u32,
    threshold: u32,
}

impl FailureCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    /// Feeds one check result. Returns the failure message exactly when
    /// the threshold is crossed; the count restarts afterwards so the
    /// next alert needs a full new run of bad checks.
    pub fn observe(&mut self, result: &SyncResult) -> Option<String> {
        if result.in_sync {
            self.consecutive = 0;
            return None;
        }

        self.consecutive += 1;
        if self.consecutive < self.threshold {
            return None;
        }

        let message = format!(
            "{} consecutive sync failures ({} position, {} score mismatches)",
            self.consecutive,
            result.position_mismatches.len(),
            result.score_mismatches.len(),
        );
        self.consecutive = 0;
        Some(message)
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// How a raised divergence gets settled. Always a caller decision —
/// never applied silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The controller's mirror stays authoritative; the board is
    /// reconfigured to adopt it.
    TrustLocal,
    /// The local mirror is cleared and rebuilt from the next
    /// board-reported events.
    TrustRemote,
}

/// Raised by the reconciler task when the failure threshold is crossed.
#[derive(Debug)]
pub enum ReconcileSignal {
    Failure { message: String },
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Handle to a running reconciler task. Dropping it stops the task.
pub struct ReconcilerHandle {
    reset_tx: mpsc::UnboundedSender<()>,
    _stop: oneshot::Sender<()>,
}

impl ReconcilerHandle {
    /// Clears the consecutive-failure count; called after a resolution
    /// so the next alert needs a fresh run of bad checks.
    pub fn reset_failures(&self) {
        let _ = self.reset_tx.send(());
    }
}

/// Spawns the periodic consistency check.
///
/// Runs until the handle is dropped. The first check happens one full
/// interval after spawning (a game that just started has nothing to
/// compare yet). Failures are delivered on `signal_tx`.
pub fn spawn_reconciler(
    local: SharedMirror,
    reported: SharedReported,
    config: SyncConfig,
    signal_tx: mpsc::Sender<ReconcileSignal>,
) -> ReconcilerHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let (reset_tx, mut reset_rx) = mpsc::unbounded_channel::<()>();
    let mut counter = FailureCounter::new(config.failure_threshold);

    tokio::spawn(async move {
        let mut ticker =
            time::interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(interval = ?config.interval, "reconciler started");

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                Some(()) = reset_rx.recv() => counter.reset(),
                _ = ticker.tick() => {
                    let (result, quiet_for) = {
                        let local = local.read().expect("mirror lock poisoned");
                        let reported =
                            reported.read().expect("reported lock poisoned");
                        (
                            compare(&local, reported.state()),
                            reported.since_last_update(),
                        )
                    };

                    match quiet_for {
                        Some(age) if age > config.quiet_warning => warn!(
                            quiet_secs = age.as_secs(),
                            "no state updates from the board"
                        ),
                        _ => {}
                    }

                    if !result.in_sync {
                        warn!(
                            positions = result.position_mismatches.len(),
                            scores = result.score_mismatches.len(),
                            "state desync detected"
                        );
                    }

                    if let Some(message) = counter.observe(&result) {
                        if signal_tx
                            .send(ReconcileSignal::Failure { message })
                            .await
                            .is_err()
                        {
                            break; // consumer gone
                        }
                    }
                }
            }
        }
        debug!("reconciler stopped");
    });

    ReconcilerHandle {
        reset_tx,
        _stop: stop_tx,
    }
}

// =========================================================================
// Tests
// =========================================================================
