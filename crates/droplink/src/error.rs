//! Unified error type for the Droplink meta-crate.

use droplink_protocol::ProtocolError;
use droplink_session::SessionError;
use droplink_transport::LinkError;

use crate::GameError;

/// Top-level error that wraps the layer-specific errors.
///
/// Callers of [`BoardClient`](crate::BoardClient) deal with this single
/// type; the `#[from]` wrappers keep `?` working across layers.
#[derive(Debug, thiserror::Error)]
pub enum DroplinkError {
    /// A transport-level error (dial, send, subscribe).
    #[error(transparent)]
    Link(#[from] LinkError),

    /// An encode/decode error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (not ready, supervisor gone).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game-flow error (out of turn, expired undo, no roster).
    #[error(transparent)]
    Game(#[from] GameError),

    /// The client's background tasks are gone.
    #[error("board client stopped")]
    Stopped,
}
