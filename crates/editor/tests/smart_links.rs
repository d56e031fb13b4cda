use note_editor::markup::{Document, NodeId};
use note_editor::{
    EditorConfig, InputEvent, LinkKind, NoteEditor, Selection, SmartDetector, SmartLinkConfig,
};

fn parse(markup: &str) -> (Document, NodeId) {
    let doc = Document::parse(markup);
    let text = doc.text_nodes_in(doc.root())[0];
    (doc, text)
}

fn detector() -> SmartDetector {
    SmartDetector::new(SmartLinkConfig::default())
}

#[test]
fn bare_domain_followed_by_a_space_is_linked() {
    let (mut doc, text) = parse("<p>Visit example.com </p>");

    let link = detector().scan(&mut doc, text, 18).unwrap().unwrap();

    assert_eq!(link.kind, LinkKind::Url);
    assert_eq!(link.href, "https://example.com");
    assert_eq!(
        doc.to_markup(),
        "<p>Visit <a href=\"https://example.com\" class=\"smart-link\" data-link-kind=\"url\">example.com</a> </p>"
    );
    assert_eq!(doc.text(link.caret.node), Some(" "));
    assert_eq!(link.caret.offset, 1);
}

#[test]
fn punctuation_after_an_email_stays_outside_the_link() {
    let (mut doc, text) = parse("<p>ping bob@mail.org, </p>");

    let link = detector().scan(&mut doc, text, 19).unwrap().unwrap();

    assert_eq!(link.kind, LinkKind::Email);
    assert_eq!(link.href, "mailto:bob@mail.org");
    assert_eq!(doc.text(link.caret.node), Some(", "));
    assert_eq!(link.caret.offset, 2);
}

#[test]
fn phone_numbers_link_to_their_digits() {
    let (mut doc, text) = parse("<p>call 555-123-4567 </p>");

    let link = detector().scan(&mut doc, text, 18).unwrap().unwrap();

    assert_eq!(link.kind, LinkKind::Phone);
    assert_eq!(link.href, "tel:5551234567");
    assert_eq!(doc.text_content(link.anchor), "555-123-4567");
}

#[test]
fn a_candidate_still_being_typed_is_left_alone() {
    let (mut doc, text) = parse("<p>example.com</p>");
    assert_eq!(detector().scan(&mut doc, text, 11).unwrap(), None);
    assert_eq!(doc.to_markup(), "<p>example.com</p>");
}

#[test]
fn a_line_break_terminates_the_last_candidate() {
    let (mut doc, text) = parse("<p>mail bob@mail.org</p>");

    let link = detector().scan_line_end(&mut doc, text).unwrap().unwrap();

    assert_eq!(link.kind, LinkKind::Email);
    assert_eq!(doc.text_content(link.anchor), "bob@mail.org");
    assert_eq!(link.caret.offset, 0);
}

#[test]
fn only_the_candidate_nearest_the_caret_is_linked() {
    let (mut doc, text) = parse("<p>a.com b.com </p>");

    let link = detector().scan(&mut doc, text, 12).unwrap().unwrap();

    assert_eq!(link.href, "https://b.com");
    assert_eq!(
        doc.to_markup(),
        "<p>a.com <a href=\"https://b.com\" class=\"smart-link\" data-link-kind=\"url\">b.com</a> </p>"
    );
}

#[test]
fn text_inside_a_link_is_never_relinked() {
    let (mut doc, text) = parse("<p><a href=\"/x\">see example.com </a></p>");
    assert_eq!(detector().scan(&mut doc, text, 16).unwrap(), None);
}

#[test]
fn disabled_kinds_are_not_detected() {
    let config = SmartLinkConfig {
        urls: false,
        phone_numbers: true,
        email_addresses: true,
    };
    let (mut doc, text) = parse("<p>Visit example.com </p>");
    let detector = SmartDetector::new(config);
    assert_eq!(detector.scan(&mut doc, text, 18).unwrap(), None);
}

#[test]
fn turning_detection_off_in_the_editor_config() {
    let mut editor = NoteEditor::new("<p>Visit</p>", EditorConfig::default(), |_: &str| {});
    let mut config = editor.config().clone();
    config.smart_links = SmartLinkConfig {
        urls: false,
        phone_numbers: false,
        email_addresses: false,
    };
    editor.set_config(config);

    let text = {
        let doc = editor.surface().doc();
        doc.text_nodes_in(doc.root())[0]
    };
    editor.set_selection(Selection::caret(text, 5)).unwrap();
    editor
        .input(InputEvent::InsertText(" example.com ".into()))
        .unwrap();
    editor.run_pending();

    assert_eq!(editor.content(), "<p>Visit example.com </p>");
}

#[test]
fn detection_waits_for_composition_to_end() {
    let mut editor = NoteEditor::new("<p></p>", EditorConfig::default(), |_: &str| {});
    let paragraph = editor.surface().doc().children(editor.surface().root())[0];
    editor.set_selection(Selection::caret(paragraph, 0)).unwrap();

    editor.composition_start();
    editor
        .input(InputEvent::InsertText("example.com ".into()))
        .unwrap();
    editor.run_pending();
    assert_eq!(editor.content(), "<p>example.com </p>");

    editor.composition_end();
    editor.run_pending();
    assert!(editor.content().contains("<a href=\"https://example.com\""));
}
