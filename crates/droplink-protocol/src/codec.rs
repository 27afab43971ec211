//! Codec trait and the JSON implementation.
//!
//! A codec converts between protocol types and the raw bytes the
//! transport carries. The rest of the system only depends on the
//! [`WireCodec`] trait, so the JSON dialect the current board firmware
//! speaks could later be swapped for a binary format without touching
//! the session or orchestration layers.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes protocol values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because the codec is held by long-lived
/// tasks that may run on any runtime thread.
pub trait WireCodec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] when the bytes are malformed:
    /// not valid JSON, missing the discriminator, an unknown variant, or
    /// a required field absent. Callers treat this as "malformed
    /// message" — log it and drop it, never crash the pipeline.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`WireCodec`] producing the UTF-8 JSON text the board firmware
/// speaks. Human-readable, which matters a lot when debugging a link to
/// a device you can't attach a debugger to.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl WireCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
