//! Heartbeat watchdog: forces a reconnect when the board goes silent.
//!
//! There is no dedicated ping message — any decoded inbound event is a
//! liveness signal. The supervisor feeds the watchdog on every event;
//! if the feed stays dry for the configured window the watchdog fires
//! its alarm exactly once and exits. Re-arming after a reconnect creates
//! a fresh watchdog, so a stale alarm can never fire into a new link.

use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// A running liveness monitor for one Ready period of the link.
///
/// Dropping the `Watchdog` stops the background task without firing.
pub struct Watchdog {
    liveness: watch::Sender<Instant>,
    /// Held only so that dropping the watchdog cancels the task.
    _stop: oneshot::Sender<()>,
}

impl Watchdog {
    /// Arms a watchdog with the given silence window. Returns the
    /// watchdog plus the alarm: the receiver resolves `Ok(())` if the
    /// window elapses without a feed, and errs if the watchdog is
    /// dropped first.
    pub fn arm(timeout: Duration) -> (Self, oneshot::Receiver<()>) {
        let (liveness, mut feed_rx) = watch::channel(Instant::now());
        let (alarm_tx, alarm_rx) = oneshot::channel();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                let deadline = *feed_rx.borrow() + timeout;
                tokio::select! {
                    // Sender side dropped → watchdog disarmed.
                    _ = &mut stop_rx => {
                        debug!("watchdog disarmed");
                        return;
                    }
                    changed = feed_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        trace!("liveness signal, idle timer reset");
                    }
                    _ = time::sleep_until(deadline) => {
                        debug!(timeout = ?timeout, "liveness window elapsed");
                        let _ = alarm_tx.send(());
                        return;
                    }
                }
            }
        });

        (
            Self {
                liveness,
                _stop: stop_tx,
            },
            alarm_rx,
        )
    }

    /// Records a liveness signal, pushing the alarm deadline out by a
    /// full window.
    pub fn feed(&self) {
        let _ = self.liveness.send(Instant::now());
    }
}

// =========================================================================
// Tests
// =========================================================================
