//! # Droplink
//!
//! Companion link for a tabletop game whose physical board keeps its own
//! authoritative state. Droplink owns the hard part of that pairing: an
//! unreliable wireless link, a command/event protocol, a reconnection
//! watchdog, and the reconciliation of two independently mutable copies
//! of the game state.
//!
//! The entry point is [`BoardClient`]: it spawns the link supervisor and
//! the turn orchestrator, takes the game-facing calls (`connect`,
//! `submit_roll`, `request_undo`, ...), and streams [`BoardNotice`]s
//! back to whatever renders the game.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use droplink::prelude::*;
//!
//! # async fn run() -> Result<(), droplink::DroplinkError> {
//! let (client, mut notices) =
//!     BoardClient::builder().spawn(WsDialer, JsonCodec);
//!
//! client.connect(BoardAddr::new("DROP-BOARD-4F2A", "192.168.4.1:9002")).await?;
//! client.set_roster(vec![
//!     PlayerSeat::new("Maya", "red"),
//!     PlayerSeat::new("Noor", "blue"),
//! ]).await?;
//!
//! client.submit_roll(PlayerId(0), 4).await?;
//! while let Some(notice) = notices.recv().await {
//!     // drive the UI from the notice stream
//!     # let _ = notice;
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod notice;
mod orchestrator;
mod roster;

pub use client::{BoardClient, BoardClientBuilder};
pub use error::DroplinkError;
pub use notice::{BoardNotice, TurnSummary};
pub use orchestrator::{GameError, TurnPhase};
pub use roster::PlayerSeat;

/// The types most integrations need, in one import.
pub mod prelude {
    pub use crate::{
        BoardClient, BoardNotice, DroplinkError, PlayerSeat, TurnSummary,
    };
    pub use droplink_protocol::{Command, Event, JsonCodec, PlayerId};
    pub use droplink_session::{DisconnectCause, LinkState};
    pub use droplink_sync::Resolution;
    #[cfg(feature = "websocket")]
    pub use droplink_transport::WsDialer;
    pub use droplink_transport::BoardAddr;
}

/// Re-exported sub-crate surfaces for integrations that need the lower
/// layers directly.
pub use droplink_engine as engine;
pub use droplink_protocol as protocol;
pub use droplink_session as session;
pub use droplink_sync as sync;
pub use droplink_transport as transport;
