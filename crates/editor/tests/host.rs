use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use note_editor::{
    BlockReason, CommitOutcome, ConflictPolicy, EditorConfig, EditorError, InputEvent,
    ManualClock, NoteEditor, NullMedia, RenderOutcome, Selection, SyncError,
};

struct Mounted {
    editor: NoteEditor,
    log: Rc<RefCell<Vec<String>>>,
    clock: ManualClock,
}

fn mount_with(markup: &str, config: EditorConfig) -> Mounted {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let clock = ManualClock::new();
    let editor = NoteEditor::with_parts(
        markup,
        config,
        Box::new(move |content: &str| sink.borrow_mut().push(content.to_string())),
        Box::new(clock.clone()),
        Box::new(NullMedia),
    );
    Mounted { editor, log, clock }
}

fn mount(markup: &str) -> Mounted {
    mount_with(markup, EditorConfig::default())
}

fn with_policy(policy: ConflictPolicy) -> EditorConfig {
    let mut config = EditorConfig::default();
    config.host.conflict_policy = policy;
    config
}

fn caret_at_end(editor: &mut NoteEditor) {
    let doc = editor.surface().doc();
    let node = *doc.text_nodes_in(doc.root()).last().unwrap();
    let len = doc.text(node).unwrap().len();
    editor.set_selection(Selection::caret(node, len)).unwrap();
}

#[test]
fn rendering_the_last_committed_content_is_a_no_op() {
    let Mounted { mut editor, log, .. } = mount("<p>a</p>");
    let root_child = editor.surface().doc().children(editor.surface().root())[0];

    assert_eq!(
        editor.render_external("<p>a</p>").unwrap(),
        RenderOutcome::Unchanged
    );
    assert_eq!(
        editor.surface().doc().children(editor.surface().root())[0],
        root_child
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn canonical_content_round_trips_through_render_and_extract() {
    let markup = concat!(
        "<h1>Plan</h1>",
        "<p>Buy <b>milk</b> &amp; <a href=\"https://example.com\">eggs</a></p>",
        "<ul class=\"checklist\"><li class=\"checklist-item checked\">",
        "<input type=\"checkbox\" class=\"checklist-checkbox\" checked=\"\">",
        "<span class=\"checklist-text\">done</span></li></ul>",
    );
    let Mounted { mut editor, log, .. } = mount("");
    assert_eq!(editor.render_external(markup).unwrap(), RenderOutcome::Applied);
    assert_eq!(editor.content(), markup);
    assert_eq!(editor.last_committed(), markup);
    assert!(log.borrow().is_empty());
}

#[test]
fn external_updates_apply_while_unfocused() {
    let Mounted { mut editor, .. } = mount("<p>a</p>");
    assert_eq!(
        editor.render_external("<p>b</p>").unwrap(),
        RenderOutcome::Applied
    );
    assert_eq!(editor.content(), "<p>b</p>");
    assert_eq!(editor.history().len(), 2);
}

#[test]
fn drop_policy_discards_updates_while_focused() {
    let Mounted { mut editor, .. } = mount_with("<p>a</p>", with_policy(ConflictPolicy::Drop));
    editor.focus();

    assert_eq!(
        editor.render_external("<p>b</p>").unwrap(),
        RenderOutcome::Dropped(BlockReason::Focused)
    );
    assert_eq!(editor.blur(), RenderOutcome::Unchanged);
    assert_eq!(editor.content(), "<p>a</p>");
}

#[test]
fn held_update_applies_on_blur() {
    let Mounted { mut editor, .. } = mount("<p>a</p>");
    editor.focus();

    assert_eq!(
        editor.render_external("<p>b</p>").unwrap(),
        RenderOutcome::Deferred(BlockReason::Focused)
    );
    assert_eq!(editor.content(), "<p>a</p>");

    assert_eq!(editor.blur(), RenderOutcome::Applied);
    assert_eq!(editor.content(), "<p>b</p>");
}

#[test]
fn held_update_loses_to_a_newer_local_edit() {
    let Mounted { mut editor, log, .. } = mount("<p>a</p>");
    editor.focus();
    caret_at_end(&mut editor);

    editor.render_external("<p>b</p>").unwrap();
    editor.input(InputEvent::InsertText("x".into())).unwrap();

    assert_eq!(editor.blur(), RenderOutcome::Unchanged);
    assert_eq!(editor.content(), "<p>ax</p>");
    assert_eq!(*log.borrow(), vec!["<p>ax</p>".to_string()]);
}

#[test]
fn held_update_loses_to_a_debounced_local_edit() {
    let mut config = EditorConfig::default();
    config.host.large_content_chars = 10;
    let Mounted { mut editor, log, .. } = mount_with("<p>a</p>", config);
    editor.focus();
    caret_at_end(&mut editor);

    assert_eq!(
        editor.render_external("<p>restored version</p>").unwrap(),
        RenderOutcome::Deferred(BlockReason::Focused)
    );
    let outcome = editor
        .input(InputEvent::InsertText(" LOCAL EDIT".into()))
        .unwrap();
    assert!(matches!(outcome, CommitOutcome::Scheduled(_)));

    assert_eq!(editor.blur(), RenderOutcome::Unchanged);
    assert_eq!(editor.content(), "<p>a LOCAL EDIT</p>");
    assert_eq!(editor.flush(), Some("<p>a LOCAL EDIT</p>".to_string()));
    assert_eq!(*log.borrow(), vec!["<p>a LOCAL EDIT</p>".to_string()]);
}

#[test]
fn reject_policy_reports_the_conflict() {
    let Mounted { mut editor, .. } = mount_with("<p>a</p>", with_policy(ConflictPolicy::Reject));
    caret_at_end(&mut editor);
    editor.composition_start();

    assert!(matches!(
        editor.render_external("<p>b</p>"),
        Err(EditorError::Sync(SyncError::Conflict {
            reason: BlockReason::Composing
        }))
    ));
}

#[test]
fn large_documents_commit_after_the_debounce() {
    let mut config = EditorConfig::default();
    config.host.large_content_chars = 10;
    let Mounted {
        mut editor,
        log,
        clock,
    } = mount_with("<p>a</p>", config);
    caret_at_end(&mut editor);

    let outcome = editor
        .input(InputEvent::InsertText("bcdefgh".into()))
        .unwrap();
    assert!(matches!(outcome, CommitOutcome::Scheduled(_)));
    assert!(log.borrow().is_empty());
    assert_eq!(editor.history().len(), 2);

    clock.advance(Duration::from_millis(299));
    assert_eq!(editor.tick(), None);

    clock.advance(Duration::from_millis(1));
    assert_eq!(editor.tick(), Some("<p>abcdefgh</p>".to_string()));
    assert_eq!(*log.borrow(), vec!["<p>abcdefgh</p>".to_string()]);
    assert_eq!(editor.tick(), None);
}

#[test]
fn a_newer_commit_restarts_the_debounce_and_wins() {
    let mut config = EditorConfig::default();
    config.host.large_content_chars = 10;
    let Mounted {
        mut editor,
        log,
        clock,
    } = mount_with("<p>abcdef</p>", config);
    caret_at_end(&mut editor);

    editor.input(InputEvent::InsertText("1".into())).unwrap();
    clock.advance(Duration::from_millis(200));
    editor.input(InputEvent::InsertText("2".into())).unwrap();
    clock.advance(Duration::from_millis(200));
    assert_eq!(editor.tick(), None);

    clock.advance(Duration::from_millis(100));
    assert_eq!(editor.tick(), Some("<p>abcdef12</p>".to_string()));
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn search_highlights_never_reach_the_document() {
    let Mounted { mut editor, log, .. } = mount("<p>find me and me</p>");

    assert_eq!(editor.highlight("ME").unwrap(), 2);
    assert_eq!(
        editor.surface().markup(),
        "<p>find <mark class=\"search-highlight\">me</mark> and <mark class=\"search-highlight\">me</mark></p>"
    );
    assert_eq!(editor.content(), "<p>find me and me</p>");

    assert_eq!(
        editor.render_external("<p>new</p>").unwrap(),
        RenderOutcome::Deferred(BlockReason::TransientOverlay)
    );
    assert_eq!(editor.clear_highlights().unwrap(), RenderOutcome::Applied);
    assert_eq!(editor.content(), "<p>new</p>");
    assert!(log.borrow().is_empty());
}
