//! Dual-state consistency checking for Droplink.
//!
//! The controller keeps a [`StateMirror`] — its own belief of every
//! player's position and score — while the physical board maintains an
//! independent copy and reports it in events. This crate periodically
//! compares the two and escalates persistent divergence:
//!
//! ```text
//! orchestrator writes ──→ StateMirror (local belief)
//!                              │ read-only
//! board events ──→ BoardReported ──→ Reconciler ── 3 strikes ──→ Failure
//! ```
//!
//! Ownership rule: only the orchestrator mutates the mirror; the
//! reconciler task holds read-only access and never resolves a
//! divergence on its own — resolution ("trust local" / "trust remote")
//! is always an explicit caller decision.

mod mirror;
mod reconciler;

pub use mirror::{BoardReported, PlayerState, SharedMirror, SharedReported, StateMirror};
pub use reconciler::{
    compare, spawn_reconciler, FailureCounter, FieldMismatch, ReconcileSignal,
    ReconcilerHandle, Resolution, SyncConfig, SyncResult,
};
