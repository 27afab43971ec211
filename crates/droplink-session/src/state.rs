//! Session state types: link lifecycle, retry budget, signals.

use std::time::Duration;

use droplink_protocol::Event;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tunables for the session layer.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Automatic reconnect attempts before giving up and asking the
    /// user. Exhaustion is terminal until an explicit `connect`.
    pub max_reconnect_attempts: u32,

    /// Delay before an automatic reconnect attempt. Long enough to let
    /// the transport stack settle after a drop.
    pub reconnect_delay: Duration,

    /// How long the board may stay silent mid-game before the watchdog
    /// forces a reconnect.
    pub heartbeat_timeout: Duration,

    /// Message size requested during capability negotiation. Room for
    /// the largest event (a roll with a chance card) in one message.
    pub preferred_frame_size: usize,

    /// Capacity of the signal queue toward the orchestrator.
    pub signal_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(2),
            heartbeat_timeout: Duration::from_secs(15),
            preferred_frame_size: 512,
            signal_queue: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// LinkState
// ---------------------------------------------------------------------------

/// The lifecycle state of the board link.
///
/// Transitions are strictly forward on success:
///
/// ```text
/// Disconnected → Connecting → NegotiatingCapabilities
///              → SubscribingNotifications → Ready
/// ```
///
/// Any failure — and any explicit disconnect — returns to
/// `Disconnected`. The supervisor is the only writer; everyone else
/// observes via its `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    NegotiatingCapabilities,
    SubscribingNotifications,
    Ready,
}

impl LinkState {
    /// Returns `true` when traffic can flow.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// The next state on the success path, `None` from `Ready`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Disconnected => Some(Self::Connecting),
            Self::Connecting => Some(Self::NegotiatingCapabilities),
            Self::NegotiatingCapabilities => Some(Self::SubscribingNotifications),
            Self::SubscribingNotifications => Some(Self::Ready),
            Self::Ready => None,
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::NegotiatingCapabilities => write!(f, "NegotiatingCapabilities"),
            Self::SubscribingNotifications => write!(f, "SubscribingNotifications"),
            Self::Ready => write!(f, "Ready"),
        }
    }
}

// ---------------------------------------------------------------------------
// ReconnectBudget
// ---------------------------------------------------------------------------

/// Counts automatic reconnect attempts against a fixed maximum.
///
/// Owned exclusively by the supervisor; nothing else increments or
/// resets it. Reset to zero on every successful Ready transition, and
/// by the watchdog's forced-reconnect path (an independent failure
/// class that deserves a fresh budget).
#[derive(Debug, Clone)]
pub struct ReconnectBudget {
    attempts: u32,
    max_attempts: u32,
}

impl ReconnectBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    /// Registers one attempt. Returns `true` when the attempt is within
    /// budget, `false` when the budget is already spent.
    pub fn record_attempt(&mut self) -> bool {
        if self.attempts < self.max_attempts {
            self.attempts += 1;
            true
        } else {
            false
        }
    }

    /// Forgives all recorded attempts.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Why the link went down. Downstream consumers deduplicate connection
/// loss handling by this tag instead of guessing which code path fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The link dropped on its own (board power, radio, range).
    Organic,
    /// The watchdog tore the link down after heartbeat silence.
    WatchdogForced,
    /// The user asked to disconnect.
    UserRequested,
}

impl std::fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organic => write!(f, "organic"),
            Self::WatchdogForced => write!(f, "watchdog-forced"),
            Self::UserRequested => write!(f, "user-requested"),
        }
    }
}

/// What the supervisor reports upward, in order, on a bounded queue.
#[derive(Debug)]
pub enum LinkSignal {
    /// The link state changed (every transition is reported).
    StateChanged(LinkState),
    /// The link just reached Ready — the board can take commands.
    Up,
    /// A decoded event from the board.
    Event(Event),
    /// The link went down. Emitted exactly once per underlying loss,
    /// tagged with its cause.
    Lost { cause: DisconnectCause },
    /// The automatic retry budget is spent; someone has to decide
    /// between retrying and staying offline.
    Exhausted,
}

// =========================================================================
// Tests
// =========================================================================
