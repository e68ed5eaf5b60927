//! Repository layer for note persistence.
//!
//! # Responsibility
//! - Define the note store contract used by the publish pipeline.
//! - Keep SQLite query details inside the persistence boundary.
//!
//! # Invariants
//! - Notes are append-only; no update or delete path exists.
//! - Repository APIs return semantic errors (`Unavailable`, `InvalidData`) in
//!   addition to DB transport errors.

pub mod note_repo;
