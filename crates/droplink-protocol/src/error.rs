//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
///
/// A `Decode` error is the "malformed message" condition: the session
/// layer logs it and drops the message rather than surfacing it as any
/// event. It is deliberately distinct from every [`Event`](crate::Event)
/// variant.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a command into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: invalid JSON, missing discriminator,
    /// unknown variant, or a required field absent. Missing position or
    /// score fields land here on purpose — they are never defaulted.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is structurally sound but violates a protocol rule —
    /// a config with zero players, a roll with an impossible dice value,
    /// a 0 tile index. Produced by [`Command::validate`](crate::Command::validate),
    /// which runs on every outbound command before it is encoded.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
