use knote_core::{render_markup, Note, NoteRepository, SqliteNoteRepository};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn list_all_returns_exact_reverse_save_order() {
    let repo = SqliteNoteRepository::open_in_memory().unwrap();
    let saved: Vec<Note> = (0..20)
        .map(|idx| repo.save(&format!("<p>note {idx}</p>")).unwrap())
        .collect();

    let listed = repo.list_all().unwrap();
    let expected: Vec<_> = saved.iter().rev().map(|note| note.id).collect();
    let actual: Vec<_> = listed.iter().map(|note| note.id).collect();
    assert_eq!(actual, expected);
}

#[test]
fn ordering_ignores_identical_timestamps_and_content() {
    let repo = SqliteNoteRepository::open_in_memory().unwrap();
    let first = repo.save("<p>same</p>").unwrap();
    let second = repo.save("<p>same</p>").unwrap();
    let third = repo.save("<p>same</p>").unwrap();

    let ids: Vec<_> = repo.list_all().unwrap().into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
}

#[test]
fn notes_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.db");

    let created = {
        let repo = SqliteNoteRepository::open(&path).unwrap();
        repo.save(&render_markup("persisted")).unwrap()
    };

    let repo = SqliteNoteRepository::open(&path).unwrap();
    let listed = repo.list_all().unwrap();
    assert_eq!(listed, vec![created]);
    assert_eq!(listed[0].content, "<p>persisted</p>\n");
}

#[test]
fn concurrent_saves_are_all_persisted() {
    let repo = Arc::new(SqliteNoteRepository::open_in_memory().unwrap());
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                (0..10)
                    .map(|idx| repo.save(&format!("<p>{worker}-{idx}</p>")).unwrap().id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut saved = HashSet::new();
    for handle in handles {
        saved.extend(handle.join().unwrap());
    }

    let listed: HashSet<_> = repo.list_all().unwrap().into_iter().map(|n| n.id).collect();
    assert_eq!(saved.len(), 80);
    assert_eq!(listed, saved);
}

#[test]
fn note_serializes_for_the_http_boundary() {
    let repo = SqliteNoteRepository::open_in_memory().unwrap();
    let note = repo.save("<p>json</p>\n").unwrap();

    let value = serde_json::to_value(&note).unwrap();
    assert_eq!(value["id"], note.id.to_string());
    assert_eq!(value["content"], "<p>json</p>\n");

    let back: Note = serde_json::from_value(value).unwrap();
    assert_eq!(back, note);
}
