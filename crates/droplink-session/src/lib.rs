//! Link lifecycle management for Droplink.
//!
//! This crate owns everything between "the user picked a board" and "a
//! decoded event stream is flowing":
//!
//! 1. **Supervision** — the [`LinkSupervisor`] actor drives the link
//!    through its connect phases, owns the reconnect policy, and pumps
//!    inbound bytes through the codec.
//! 2. **Liveness** — the [`Watchdog`] forces a reconnect when the board
//!    goes silent mid-game, with its own fresh retry budget.
//! 3. **State** — [`LinkState`] is published read-only over a `watch`
//!    channel; [`ReconnectBudget`] is owned by the supervisor alone.
//!
//! # How it fits in the stack
//!
//! ```text
//! Orchestrator (above)  ← consumes LinkSignal, issues commands
//!     ↕
//! Session layer (this crate)  ← lifecycle, retries, liveness
//!     ↕
//! Transport/Protocol (below)  ← raw links, Command/Event types
//! ```

mod error;
mod state;
mod supervisor;
mod watchdog;

pub use error::SessionError;
pub use state::{DisconnectCause, LinkSignal, LinkState, ReconnectBudget, SessionConfig};
pub use supervisor::{spawn_supervisor, LinkSupervisorHandle};
pub use watchdog::Watchdog;
