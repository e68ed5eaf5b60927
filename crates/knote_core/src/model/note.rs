//! Note domain model.
//!
//! # Invariants
//! - `id` is assigned by the note store and never reused.
//! - `content` is rendered display markup, never raw markdown.
//! - Notes are immutable once created.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a persisted note.
pub type NoteId = Uuid;

/// A published note as returned by the note store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Sanitized HTML produced by `render_markup`.
    pub content: String,
    /// Creation time in epoch milliseconds. Display only; ordering uses
    /// insertion sequence.
    pub created_at: i64,
}

impl Note {
    /// Allocates a fresh note id.
    pub fn new_id() -> NoteId {
        Uuid::new_v4()
    }
}
