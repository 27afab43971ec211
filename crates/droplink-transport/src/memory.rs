//! In-process loopback link with failure injection.
//!
//! [`simulator`] returns a dialer for the controller side and a
//! [`BoardSimulator`] playing the board side. Every `dial` yields a
//! fresh session on the simulator, so reconnect sequences can be
//! exercised end to end. The knobs (`refuse_next`, `fail_subscribe_next`,
//! `cap_frame_size`) inject the distinct connect-phase failures the
//! session layer's retry policy has to tell apart.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::{
    BoardAddr, BoardDialer, BoardLink, LinkError, LinkId, INBOUND_QUEUE_CAPACITY,
};

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct Knobs {
    refuse_next: u32,
    fail_negotiate_next: u32,
    fail_subscribe_next: u32,
    frame_cap: Option<usize>,
}

struct Shared {
    knobs: Mutex<Knobs>,
    accept_tx: mpsc::UnboundedSender<SimSession>,
    dial_attempts: AtomicU32,
}

/// Creates a connected (controller dialer, board simulator) pair.
pub fn simulator() -> (MemoryDialer, BoardSimulator) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        knobs: Mutex::new(Knobs::default()),
        accept_tx,
        dial_attempts: AtomicU32::new(0),
    });
    (
        MemoryDialer {
            shared: Arc::clone(&shared),
        },
        BoardSimulator { accept_rx, shared },
    )
}

// ---------------------------------------------------------------------------
// Controller side
// ---------------------------------------------------------------------------

/// Dials the in-process board simulator.
#[derive(Clone)]
pub struct MemoryDialer {
    shared: Arc<Shared>,
}

impl BoardDialer for MemoryDialer {
    type Link = MemoryLink;

    async fn dial(&self, target: &BoardAddr) -> Result<MemoryLink, LinkError> {
        self.shared.dial_attempts.fetch_add(1, Ordering::Relaxed);

        let (refused, fail_negotiate, fail_subscribe, frame_cap) = {
            let mut knobs = self.shared.knobs.lock().expect("knobs poisoned");
            let refused = if knobs.refuse_next > 0 {
                knobs.refuse_next -= 1;
                true
            } else {
                false
            };
            let fail_negotiate = if !refused && knobs.fail_negotiate_next > 0 {
                knobs.fail_negotiate_next -= 1;
                true
            } else {
                false
            };
            let fail_subscribe =
                if !refused && !fail_negotiate && knobs.fail_subscribe_next > 0 {
                    knobs.fail_subscribe_next -= 1;
                    true
                } else {
                    false
                };
            (refused, fail_negotiate, fail_subscribe, knobs.frame_cap)
        };

        if refused {
            return Err(LinkError::Unreachable(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("simulator refused dial to {target}"),
            )));
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);

        self.shared
            .accept_tx
            .send(SimSession {
                commands: cmd_rx,
                events: evt_tx,
            })
            .map_err(|_| {
                LinkError::Unreachable(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "simulator dropped",
                ))
            })?;

        let id = LinkId::new(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, board = %target, "memory link established");

        Ok(MemoryLink {
            id,
            cmd_tx: Mutex::new(Some(cmd_tx)),
            inbound: Some(evt_rx),
            fail_negotiate,
            fail_subscribe,
            frame_cap,
            open: AtomicBool::new(true),
        })
    }
}

/// Controller end of a loopback link.
pub struct MemoryLink {
    id: LinkId,
    /// Dropped on close so the simulator sees the command stream end.
    cmd_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    inbound: Option<mpsc::Receiver<Vec<u8>>>,
    fail_negotiate: bool,
    fail_subscribe: bool,
    frame_cap: Option<usize>,
    open: AtomicBool,
}

impl BoardLink for MemoryLink {
    async fn negotiate_frame_size(&mut self, preferred: usize) -> Result<usize, LinkError> {
        if self.fail_negotiate {
            return Err(LinkError::NegotiationFailed(
                "board stopped answering mid-setup".into(),
            ));
        }
        match self.frame_cap {
            Some(cap) if cap < preferred => {
                tracing::debug!(
                    id = %self.id,
                    preferred,
                    granted = cap,
                    "frame size capped, falling back"
                );
                Ok(cap)
            }
            _ => Ok(preferred),
        }
    }

    async fn subscribe(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, LinkError> {
        if self.fail_subscribe {
            return Err(LinkError::SubscribeFailed(
                "notification arming refused".into(),
            ));
        }
        self.inbound
            .take()
            .ok_or_else(|| LinkError::SubscribeFailed("already subscribed".into()))
    }

    async fn send(&self, data: &[u8]) -> Result<(), LinkError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(LinkError::NotReady);
        }
        let guard = self.cmd_tx.lock().expect("cmd_tx poisoned");
        match guard.as_ref() {
            Some(tx) => tx.send(data.to_vec()).map_err(|_| LinkError::Closed),
            None => Err(LinkError::NotReady),
        }
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            // Dropping the sender ends the simulator's command stream.
            self.cmd_tx.lock().expect("cmd_tx poisoned").take();
            tracing::debug!(id = %self.id, "link closed");
        }
    }

    fn id(&self) -> LinkId {
        self.id
    }
}

// ---------------------------------------------------------------------------
// Board side
// ---------------------------------------------------------------------------

/// The board end of the loopback: accepts sessions and injects failures.
pub struct BoardSimulator {
    accept_rx: mpsc::UnboundedReceiver<SimSession>,
    shared: Arc<Shared>,
}

impl BoardSimulator {
    /// Waits for the next dial from the controller side.
    pub async fn accept(&mut self) -> Option<SimSession> {
        self.accept_rx.recv().await
    }

    /// Makes the next `n` dials fail as unreachable.
    pub fn refuse_next(&self, n: u32) {
        self.shared.knobs.lock().expect("knobs poisoned").refuse_next = n;
    }

    /// Makes the next `n` accepted links fail at the negotiation phase.
    pub fn fail_negotiate_next(&self, n: u32) {
        self.shared
            .knobs
            .lock()
            .expect("knobs poisoned")
            .fail_negotiate_next = n;
    }

    /// Makes the next `n` accepted links fail at the subscribe phase.
    pub fn fail_subscribe_next(&self, n: u32) {
        self.shared
            .knobs
            .lock()
            .expect("knobs poisoned")
            .fail_subscribe_next = n;
    }

    /// Caps the negotiable frame size, forcing a fallback when the
    /// controller asks for more.
    pub fn cap_frame_size(&self, cap: usize) {
        self.shared.knobs.lock().expect("knobs poisoned").frame_cap = Some(cap);
    }

    /// How many dial attempts the controller has made (including
    /// refused ones).
    pub fn dial_count(&self) -> u32 {
        self.shared.dial_attempts.load(Ordering::Relaxed)
    }
}

/// One accepted session, from dial until either side hangs up.
pub struct SimSession {
    commands: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::Sender<Vec<u8>>,
}

impl SimSession {
    /// Receives the next command from the controller. `None` means the
    /// controller closed the link.
    pub async fn recv_command(&mut self) -> Option<Vec<u8>> {
        self.commands.recv().await
    }

    /// Sends an event to the controller. Returns `false` when the link
    /// is gone. Dropping the session altogether simulates a board-side
    /// connection loss.
    pub async fn send_event(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.events.send(bytes.into()).await.is_ok()
    }
}

// =========================================================================
// Tests
// =========================================================================
