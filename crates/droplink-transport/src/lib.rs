//! Transport abstraction layer for Droplink.
//!
//! Provides the [`BoardDialer`] and [`BoardLink`] traits that abstract
//! over the wireless point-to-point connection to a physical board, plus
//! two implementations:
//!
//! - `websocket` (default) — outbound WebSocket client via
//!   `tokio-tungstenite`, for boards reachable over the local network.
//! - `memory` — an in-process loopback pair with failure injection, used
//!   by integration tests and the board simulator demo.
//!
//! The transport knows nothing about the protocol: it moves opaque byte
//! messages. Inbound messages are pumped into a **bounded** queue so
//! that a slow consumer backs up the queue, never the link's own read
//! loop.

mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::LinkError;
#[cfg(feature = "websocket")]
pub use websocket::{WsDialer, WsLink};

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;

/// Default capacity of the inbound message queue handed out by
/// [`BoardLink::subscribe`]. Generous enough to absorb an event burst
/// from the board; small enough that a wedged consumer is noticed.
pub const INBOUND_QUEUE_CAPACITY: usize = 64;

/// The message size every transport can carry without negotiation.
/// Mirrors the smallest link we target; [`BoardLink::negotiate_frame_size`]
/// tries to do better.
pub const DEFAULT_FRAME_SIZE: usize = 23;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifies one physical board: a stable advertised id plus the
/// address to dial it at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardAddr {
    /// The board's advertised name ("DROP-BOARD-4F2A").
    pub id: String,
    /// Transport-specific address (host:port for WebSocket links).
    pub addr: String,
}

impl BoardAddr {
    pub fn new(id: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            addr: addr.into(),
        }
    }
}

impl fmt::Display for BoardAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.addr)
    }
}

/// Opaque identifier for one established link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

impl LinkId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Establishes links to boards.
///
/// Methods are declared as `impl Future + Send` (rather than plain
/// `async fn`) so that generic callers can drive a link from inside
/// `tokio::spawn`ed tasks; implementations still just write `async fn`.
pub trait BoardDialer: Send + Sync + 'static {
    /// The link type produced by this dialer.
    type Link: BoardLink;

    /// Connects to the given board.
    ///
    /// # Errors
    /// [`LinkError::Unreachable`] when the board cannot be reached.
    fn dial(
        &self,
        target: &BoardAddr,
    ) -> impl Future<Output = Result<Self::Link, LinkError>> + Send;
}

/// One established connection to a board.
///
/// The expected call order after `dial` is `negotiate_frame_size` →
/// `subscribe` → traffic; the session layer drives these as explicit
/// lifecycle phases.
pub trait BoardLink: Send + Sync + 'static {
    /// Tries to raise the maximum message size above
    /// [`DEFAULT_FRAME_SIZE`]. A *refusal* is not an error: the link
    /// keeps working at the default, silently apart from a debug log.
    /// Payloads below the granted size travel as a single un-chunked
    /// message.
    ///
    /// # Errors
    /// [`LinkError::NegotiationFailed`] when the negotiation exchange
    /// itself breaks the link (the board stops answering mid-setup);
    /// the link is unusable afterwards.
    fn negotiate_frame_size(
        &mut self,
        preferred: usize,
    ) -> impl Future<Output = Result<usize, LinkError>> + Send;

    /// Arms delivery of unsolicited inbound messages.
    ///
    /// Returns the receiving end of a bounded queue
    /// ([`INBOUND_QUEUE_CAPACITY`]). The queue closing (recv yields
    /// `None`) means the link dropped.
    ///
    /// # Errors
    /// [`LinkError::SubscribeFailed`] when notifications cannot be
    /// enabled; may only be called once per link.
    fn subscribe(
        &mut self,
    ) -> impl Future<Output = Result<mpsc::Receiver<Vec<u8>>, LinkError>> + Send;

    /// Queues one outbound message. Fire-and-forget: a successful return
    /// means queued, not delivered.
    ///
    /// # Errors
    /// [`LinkError::NotReady`] after `close`, [`LinkError::Closed`] when
    /// the remote side is gone.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Tears the link down. Always succeeds and is idempotent — closing
    /// twice is a no-op, never an error.
    fn close(&self) -> impl Future<Output = ()> + Send;

    /// Unique identifier for this link instance.
    fn id(&self) -> LinkId;
}
