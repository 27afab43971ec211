/// Errors that can occur at the link layer.
///
/// The connect-phase failures (`Unreachable`, `NegotiationFailed`,
/// `SubscribeFailed`) are deliberately distinct variants: the session
/// layer's retry policy keys off which phase failed.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The board could not be reached at all.
    #[error("board unreachable: {0}")]
    Unreachable(#[source] std::io::Error),

    /// The link came up but capability negotiation broke it.
    #[error("capability negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The link came up but notifications could not be enabled.
    #[error("notification subscription failed: {0}")]
    SubscribeFailed(String),

    /// `send` was called on a link that is not ready (closed locally,
    /// or not yet subscribed).
    #[error("link is not ready")]
    NotReady,

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The remote side is gone.
    #[error("link closed by remote")]
    Closed,
}
