//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist rendered notes and assign their stable ids.
//! - List notes newest first.
//!
//! # Invariants
//! - `list_all` returns notes in exact reverse insertion order, driven by the
//!   `seq` autoincrement column rather than timestamps.
//! - One `save` is one INSERT; concurrent callers are serialized on the
//!   connection mutex.
//! - `created_at` is wall-clock epoch milliseconds taken at `save`.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::note::{Note, NoteId};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for note persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Persisted row cannot be mapped back to a `Note`.
    InvalidData(String),
    /// Storage cannot be used any more (e.g. a writer panicked mid-operation).
    Unavailable(String),
    /// Connection is missing the schema this repository needs.
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::Unavailable(message) => write!(f, "note store unavailable: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence boundary for published notes.
pub trait NoteRepository: Send + Sync {
    /// Persists already-rendered `content` as a new note.
    fn save(&self, content: &str) -> RepoResult<Note>;
    /// Returns every note, most recently created first.
    fn list_all(&self) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note repository sharing one connection between callers.
pub struct SqliteNoteRepository {
    conn: Mutex<Connection>,
}

impl SqliteNoteRepository {
    /// Wraps a migrated connection.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_notes_table(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RepoError::Unavailable("connection lock poisoned".to_string()))
    }
}

impl NoteRepository for SqliteNoteRepository {
    fn save(&self, content: &str) -> RepoResult<Note> {
        let started_at = Instant::now();
        let id = Note::new_id();
        let conn = self.lock()?;

        let created_at = Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO notes (uuid, content, created_at) VALUES (?1, ?2, ?3);",
            params![id.to_string(), content, created_at],
        )
        .map_err(|err| {
            error!(
                "event=note_save module=repo status=error error_code=note_insert_failed error={}",
                err
            );
            RepoError::from(err)
        })?;

        info!(
            "event=note_save module=repo status=ok note_id={} content_len={} duration_ms={}",
            id,
            content.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Note {
            id,
            content: content.to_string(),
            created_at,
        })
    }

    fn list_all(&self) -> RepoResult<Vec<Note>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT uuid, content, created_at
             FROM notes
             ORDER BY seq DESC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Note {
        id: parse_uuid(&uuid_text)?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_uuid(value: &str) -> RepoResult<NoteId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in notes.uuid")))
}

fn ensure_notes_table(conn: &Connection) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'notes'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::MissingRequiredTable("notes"))
    }
}

#[cfg(test)]
mod tests {
    use super::{NoteRepository, RepoError, SqliteNoteRepository};
    use rusqlite::Connection;

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteNoteRepository::try_new(conn).err().unwrap();
        assert!(matches!(err, RepoError::MissingRequiredTable("notes")));
    }

    #[test]
    fn save_assigns_fresh_ids_and_keeps_content() {
        let repo = SqliteNoteRepository::open_in_memory().unwrap();
        let first = repo.save("<p>a</p>\n").unwrap();
        let second = repo.save("<p>a</p>\n").unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.content, "<p>a</p>\n");
        assert!(first.created_at > 0);
    }

    #[test]
    fn created_at_has_millisecond_resolution() {
        let repo = SqliteNoteRepository::open_in_memory().unwrap();

        let before = chrono::Utc::now().timestamp_millis();
        let note = repo.save("<p>t</p>\n").unwrap();
        let after = chrono::Utc::now().timestamp_millis();

        assert!(
            (before..=after).contains(&note.created_at),
            "created_at {} outside [{before}, {after}]",
            note.created_at
        );
        assert_eq!(repo.list_all().unwrap()[0].created_at, note.created_at);
    }

    #[test]
    fn corrupted_uuid_is_reported_as_invalid_data() {
        let repo = SqliteNoteRepository::open_in_memory().unwrap();
        repo.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO notes (uuid, content) VALUES ('not-a-uuid', 'x');",
                [],
            )
            .unwrap();

        let err = repo.list_all().unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }
}
