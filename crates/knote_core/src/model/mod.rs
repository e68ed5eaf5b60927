//! Domain model for notes and uploaded assets.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Notes and assets are immutable after creation.

pub mod asset;
pub mod note;
