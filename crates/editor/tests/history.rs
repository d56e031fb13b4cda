use note_editor::{History, HistoryConfig};

fn small_history() -> History {
    History::new(HistoryConfig {
        max_entries: 3,
        max_entries_large: 2,
        large_document_chars: 10,
    })
}

#[test]
fn undo_and_redo_walk_the_linear_stack() {
    let mut history = History::new(HistoryConfig::default());
    for snapshot in ["a", "ab", "abc"] {
        assert!(history.push(snapshot));
    }

    assert!(history.can_undo());
    assert!(!history.can_redo());
    assert_eq!(history.undo(), Some("ab"));
    assert_eq!(history.undo(), Some("a"));
    assert_eq!(history.undo(), None);
    assert_eq!(history.position(), 0);

    assert_eq!(history.redo(), Some("ab"));
    assert_eq!(history.current().map(|e| e.snapshot.as_str()), Some("ab"));
}

#[test]
fn push_after_undo_discards_the_redo_tail() {
    let mut history = History::new(HistoryConfig::default());
    history.push("a");
    history.push("b");
    history.push("c");
    history.undo();
    history.undo();

    history.push("z");

    let snapshots: Vec<&str> = history.entries().map(|e| e.snapshot.as_str()).collect();
    assert_eq!(snapshots, vec!["a", "z"]);
    assert!(!history.can_redo());
    assert_eq!(history.redo(), None);
}

#[test]
fn duplicate_of_current_snapshot_is_not_pushed() {
    let mut history = History::new(HistoryConfig::default());
    assert!(history.push("a"));
    assert!(!history.push("a"));
    assert_eq!(history.len(), 1);
}

#[test]
fn oldest_entries_are_evicted_past_the_cap() {
    let mut history = small_history();
    for snapshot in ["a", "b", "c", "d"] {
        history.push(snapshot);
    }

    let snapshots: Vec<&str> = history.entries().map(|e| e.snapshot.as_str()).collect();
    assert_eq!(snapshots, vec!["b", "c", "d"]);
    let indices: Vec<u64> = history.entries().map(|e| e.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(history.position(), 2);
}

#[test]
fn large_documents_use_the_smaller_cap() {
    let mut history = small_history();
    history.push("short");
    history.push("long snapshot 1");
    history.push("long snapshot 2");

    assert_eq!(history.len(), 2);
    assert_eq!(
        history.current().map(|e| e.snapshot.as_str()),
        Some("long snapshot 2")
    );
    assert_eq!(history.undo(), Some("long snapshot 1"));
    assert_eq!(history.undo(), None);
}

#[test]
fn clear_forgets_everything() {
    let mut history = small_history();
    history.push("a");
    history.push("b");
    history.clear();

    assert!(history.is_empty());
    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert!(history.current().is_none());
}
