//! Error types for the session layer.

use droplink_protocol::ProtocolError;
use droplink_transport::LinkError;

/// Errors that can occur while operating the link session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A command was submitted while the link is not Ready. Commands
    /// are never queued across reconnects — the caller decides what is
    /// still worth sending once the link is back.
    #[error("link is not ready")]
    NotReady,

    /// A transport-level failure.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// An encode/decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The supervisor task is gone (shutdown or crash).
    #[error("link supervisor stopped")]
    Stopped,
}
