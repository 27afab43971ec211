//! Wire protocol for Droplink.
//!
//! This crate defines the "language" that the controller and the physical
//! board speak over the wireless link:
//!
//! - **Types** ([`Command`], [`Event`], [`PlayerId`], etc.) — the message
//!   structures that travel on the wire.
//! - **Codec** ([`WireCodec`] trait, [`JsonCodec`]) — how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw bytes) and the
//! session layer (link lifecycle). It doesn't know about connections or
//! game state — it only knows how to serialize and deserialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (Command/Event) → Session (link context)
//! ```

mod codec;
mod error;
mod types;

pub use codec::WireCodec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ChanceCardReport, Command, Event, Movement, PlacementIssue, PlayerId,
    RestoredScore, ScoreReport, TileReport,
};
