use std::cell::RefCell;
use std::rc::Rc;

use note_editor::markup::{Document, NodeId};
use note_editor::widgets::{
    Alignment, WidgetAction, WidgetKind, WidgetManager, WidgetOutcome, handles_visible,
};
use note_editor::{
    Blob, EditorConfig, EditorError, IncomingFile, ManualClock, MediaBackend, NoteEditor,
    PlayerId, Selection, TableStyle, WidgetError, WidgetLimits, generate_table_html,
};

const IMAGE: &str = concat!(
    "<div class=\"note-image\" data-widget=\"image\" data-width=\"300\" data-align=\"center\" contenteditable=\"false\">",
    "<img src=\"data:image/png;base64,AQID\" alt=\"pic.png\" style=\"width: 300px;\">",
    "<span class=\"resize-handle\"></span>",
    "<button class=\"widget-delete\" type=\"button\"></button>",
    "</div>",
);

const AUDIO: &str = concat!(
    "<div class=\"note-audio\" data-widget=\"audio\" data-duration=\"90\" data-speed=\"1\" contenteditable=\"false\">",
    "<audio src=\"data:audio/webm;base64,AQID\" preload=\"metadata\"></audio>",
    "<button class=\"audio-toggle\" type=\"button\"></button>",
    "<span class=\"audio-time\">1:30</span>",
    "<button class=\"audio-speed\" type=\"button\">1x</button>",
    "<button class=\"widget-delete\" type=\"button\"></button>",
    "</div>",
);

const CHECKLIST: &str = concat!(
    "<ul class=\"checklist\"><li class=\"checklist-item\">",
    "<input type=\"checkbox\" class=\"checklist-checkbox\">",
    "<span class=\"checklist-text\">milk</span>",
    "</li></ul>",
);

#[derive(Clone, Default)]
struct RecordingMedia {
    events: Rc<RefCell<Vec<String>>>,
}

impl MediaBackend for RecordingMedia {
    fn play(&mut self, player: PlayerId, _src: &str) {
        self.events.borrow_mut().push(format!("play {}", player.0));
    }

    fn pause(&mut self, player: PlayerId) {
        self.events.borrow_mut().push(format!("pause {}", player.0));
    }

    fn seek(&mut self, player: PlayerId, seconds: f64) {
        self.events
            .borrow_mut()
            .push(format!("seek {} {seconds}", player.0));
    }

    fn set_rate(&mut self, player: PlayerId, rate: f64) {
        self.events
            .borrow_mut()
            .push(format!("rate {} {rate}", player.0));
    }

    fn release(&mut self, player: PlayerId) {
        self.events.borrow_mut().push(format!("release {}", player.0));
    }
}

fn mount(markup: &str) -> (NoteEditor, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let editor = NoteEditor::new(markup, EditorConfig::default(), move |content: &str| {
        sink.borrow_mut().push(content.to_string())
    });
    (editor, log)
}

fn mount_with_media(markup: &str, media: RecordingMedia) -> NoteEditor {
    NoteEditor::with_parts(
        markup,
        EditorConfig::default(),
        Box::new(|_: &str| {}),
        Box::new(ManualClock::new()),
        Box::new(media),
    )
}

fn by_class(editor: &NoteEditor, class: &str) -> Vec<NodeId> {
    let doc = editor.surface().doc();
    doc.find_by_class(doc.root(), class)
}

fn first_tag(editor: &NoteEditor, tag: &str) -> NodeId {
    let doc = editor.surface().doc();
    doc.find_first(doc.root(), |d, n| d.is_element(n, tag))
        .unwrap()
}

#[test]
fn reattach_binds_each_widget_once() {
    let markup = format!("{IMAGE}{AUDIO}{CHECKLIST}");
    let mut doc = Document::parse(&markup);
    let root = doc.root();
    let mut widgets = WidgetManager::new(WidgetLimits::default());

    assert_eq!(widgets.reattach(&mut doc, root), 3);
    assert_eq!(widgets.players().len(), 1);
    assert_eq!(widgets.reattach(&mut doc, root), 0);
    assert_eq!(widgets.players().len(), 1);
    assert_eq!(doc.to_markup(), markup);
}

#[test]
fn reattach_restores_missing_image_chrome() {
    let mut doc = Document::parse(concat!(
        "<div class=\"note-image\" data-widget=\"image\" data-width=\"420\">",
        "<img src=\"data:image/png;base64,AQID\">",
        "</div>",
    ));
    let root = doc.root();
    let mut widgets = WidgetManager::new(WidgetLimits::default());
    widgets.reattach(&mut doc, root);

    assert_eq!(
        doc.to_markup(),
        concat!(
            "<div class=\"note-image\" data-widget=\"image\" data-width=\"420\">",
            "<img src=\"data:image/png;base64,AQID\" style=\"width: 420px;\">",
            "<span class=\"resize-handle\"></span>",
            "</div>",
        )
    );
}

#[test]
fn dragging_the_image_handle_resizes_and_commits() {
    let (mut editor, log) = mount(IMAGE);
    let handle = by_class(&editor, "resize-handle")[0];

    editor.pointer_down(handle, 100.0, 1000.0).unwrap();
    assert_eq!(editor.pointer_move(250.0).unwrap(), Some(450.0));
    assert!(log.borrow().is_empty());

    let committed = editor.pointer_up().unwrap().unwrap();
    assert_eq!(committed.kind, WidgetKind::Image);
    assert_eq!(committed.width, 450.0);

    let content = editor.content();
    assert!(content.contains("data-width=\"450\""));
    assert!(content.contains("style=\"width: 450px;\""));
    assert!(!content.contains("widget-selected"));
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn image_width_is_clamped() {
    let (mut editor, _log) = mount(IMAGE);
    let handle = by_class(&editor, "resize-handle")[0];

    editor.pointer_down(handle, 0.0, 1000.0).unwrap();
    assert_eq!(editor.pointer_move(10_000.0).unwrap(), Some(800.0));
    assert_eq!(editor.pointer_move(-10_000.0).unwrap(), Some(50.0));
    assert_eq!(editor.pointer_up().unwrap().map(|c| c.width), Some(50.0));
}

#[test]
fn inverted_limits_are_normalized_before_clamping() {
    let (mut editor, _log) = mount(IMAGE);
    let mut config = editor.config().clone();
    config.widgets.image_min_px = 800.0;
    config.widgets.image_max_px = 50.0;
    config.widgets.table_max_pct = f64::NAN;
    editor.set_config(config);

    let limits = editor.widgets().limits();
    assert_eq!((limits.image_min_px, limits.image_max_px), (50.0, 800.0));
    assert_eq!((limits.table_min_pct, limits.table_max_pct), (20.0, 100.0));

    let handle = by_class(&editor, "resize-handle")[0];
    editor.pointer_down(handle, 0.0, 1000.0).unwrap();
    assert_eq!(editor.pointer_move(10_000.0).unwrap(), Some(800.0));
}

#[test]
fn table_resize_works_in_percent_of_the_parent() {
    let (mut editor, _log) = mount(&generate_table_html(2, 2, TableStyle::Default));
    let handle = by_class(&editor, "table-resize-handle")[0];
    let wrapper = by_class(&editor, "note-table-wrapper")[0];

    editor.pointer_down(handle, 500.0, 1000.0).unwrap();
    assert_eq!(editor.pointer_move(200.0).unwrap(), Some(70.0));
    let doc = editor.surface().doc();
    assert_eq!(doc.attr(wrapper, "data-width"), Some("70"));
    assert_eq!(doc.attr(wrapper, "style"), Some("width: 70%;"));

    assert_eq!(editor.pointer_move(-1000.0).unwrap(), Some(20.0));
    let committed = editor.pointer_up().unwrap().unwrap();
    assert_eq!(committed.kind, WidgetKind::Table);
    assert_eq!(committed.width, 20.0);
}

#[test]
fn only_one_resize_session_at_a_time() {
    let markup = format!("{IMAGE}{IMAGE}");
    let (mut editor, _log) = mount(&markup);
    let handles = by_class(&editor, "resize-handle");

    editor.pointer_down(handles[0], 0.0, 1000.0).unwrap();
    assert_eq!(editor.widgets().global_listeners(), 1);
    assert!(matches!(
        editor.pointer_down(handles[1], 0.0, 1000.0),
        Err(EditorError::Widget(WidgetError::ResizeInProgress))
    ));

    editor.pointer_up().unwrap();
    assert_eq!(editor.widgets().global_listeners(), 0);
    assert!(editor.widgets().resize_session().is_none());
    assert_eq!(editor.pointer_up().unwrap(), None);
    assert_eq!(editor.pointer_move(10.0).unwrap(), None);
}

#[test]
fn resizing_needs_a_handle() {
    let (mut editor, _log) = mount(IMAGE);
    let img = first_tag(&editor, "img");
    assert!(matches!(
        editor.pointer_down(img, 0.0, 1000.0),
        Err(EditorError::Widget(WidgetError::NotResizable))
    ));
    assert_eq!(editor.widgets().global_listeners(), 0);
}

#[test]
fn deleting_a_playing_audio_widget_releases_its_player() {
    let media = RecordingMedia::default();
    let events = media.events.clone();
    let mut editor = mount_with_media(&format!("<p>a</p>{AUDIO}"), media);
    let audio = first_tag(&editor, "audio");

    let toggle = by_class(&editor, "audio-toggle")[0];
    assert_eq!(editor.click(toggle).unwrap(), WidgetOutcome::Unchanged);
    assert!(editor.widgets().players().any_playing());
    assert!(!editor.content().contains("is-playing"));

    let delete = by_class(&editor, "widget-delete")[0];
    assert_eq!(editor.click(delete).unwrap(), WidgetOutcome::Removed);

    assert_eq!(*events.borrow(), vec!["play 1", "pause 1", "release 1"]);
    assert!(editor.widgets().players().is_empty());
    assert_eq!(editor.surface().doc().attr(audio, "src"), None);
    assert_eq!(editor.content(), "<p>a</p>");
}

#[test]
fn undo_releases_players_before_rerendering() {
    let media = RecordingMedia::default();
    let events = media.events.clone();
    let mut editor = mount_with_media("<p>a</p>", media);
    let text = {
        let doc = editor.surface().doc();
        doc.text_nodes_in(doc.root())[0]
    };
    editor.set_selection(Selection::caret(text, 1)).unwrap();

    let recording = IncomingFile::new("memo.webm", "audio/webm", vec![1, 2, 3]);
    let widget = editor.insert_audio(&recording, 12.0).unwrap();
    editor.widget_action(widget, WidgetAction::Play).unwrap();

    assert!(editor.undo());
    assert_eq!(*events.borrow(), vec!["play 1", "pause 1", "release 1"]);
    assert!(editor.widgets().players().is_empty());
    assert_eq!(editor.content(), "<p>a</p>");
}

#[test]
fn selection_is_exclusive_and_outside_clicks_clear_it() {
    let markup = format!("{IMAGE}<p>x</p>{IMAGE}");
    let (mut editor, log) = mount(&markup);
    let images = by_class(&editor, "note-image");
    let imgs: Vec<NodeId> = {
        let doc = editor.surface().doc();
        doc.find_all(doc.root(), |d, n| d.is_element(n, "img"))
    };

    assert_eq!(editor.click(imgs[0]).unwrap(), WidgetOutcome::Selected);
    assert!(handles_visible(editor.surface().doc(), images[0]));

    editor.click(imgs[1]).unwrap();
    assert!(!handles_visible(editor.surface().doc(), images[0]));
    assert!(handles_visible(editor.surface().doc(), images[1]));

    let outside = {
        let doc = editor.surface().doc();
        doc.text_nodes_in(doc.root())[0]
    };
    assert_eq!(editor.click(outside).unwrap(), WidgetOutcome::Unchanged);
    assert!(by_class(&editor, "widget-selected").is_empty());
    assert!(log.borrow().is_empty());
}

#[test]
fn clicking_a_checkbox_toggles_the_item() {
    let (mut editor, log) = mount(CHECKLIST);
    let checkbox = by_class(&editor, "checklist-checkbox")[0];

    assert_eq!(editor.click(checkbox).unwrap(), WidgetOutcome::Changed);
    let checked = concat!(
        "<ul class=\"checklist\"><li class=\"checklist-item checked\">",
        "<input type=\"checkbox\" class=\"checklist-checkbox\" checked=\"\">",
        "<span class=\"checklist-text\">milk</span>",
        "</li></ul>",
    );
    assert_eq!(editor.content(), checked);
    assert_eq!(log.borrow().last().map(String::as_str), Some(checked));

    editor.click(checkbox).unwrap();
    assert_eq!(editor.content(), CHECKLIST);

    let text = by_class(&editor, "checklist-text")[0];
    assert_eq!(editor.click(text).unwrap(), WidgetOutcome::Unchanged);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn attachment_downloads_its_stored_bytes() {
    let (mut editor, _log) = mount("<p>a</p>");
    let text = {
        let doc = editor.surface().doc();
        doc.text_nodes_in(doc.root())[0]
    };
    editor.set_selection(Selection::caret(text, 1)).unwrap();

    let file = IncomingFile::new("notes.txt", "text/plain", b"hello".to_vec());
    let widget = editor.insert_attachment(&file).unwrap();

    let doc = editor.surface().doc();
    let size = doc.find_by_class(widget, "attachment-size")[0];
    assert_eq!(doc.text_content(size), "5 B");
    let download = doc.find_by_class(widget, "attachment-download")[0];

    assert_eq!(
        editor.click(download).unwrap(),
        WidgetOutcome::Download(Blob {
            name: "notes.txt".into(),
            mime: "text/plain".into(),
            bytes: b"hello".to_vec(),
        })
    );
}

#[test]
fn actions_a_widget_does_not_support_are_errors() {
    let (mut editor, _log) = mount(IMAGE);
    let image = by_class(&editor, "note-image")[0];
    assert!(matches!(
        editor.widget_action(image, WidgetAction::Play),
        Err(EditorError::Widget(WidgetError::Unsupported {
            kind: "image",
            action: "play"
        }))
    ));
    assert!(!editor.widgets().dispatch_table().supports(WidgetKind::Image, WidgetAction::Play.kind()));
}

#[test]
fn image_alignment_is_committed() {
    let (mut editor, log) = mount(IMAGE);
    let image = by_class(&editor, "note-image")[0];

    let outcome = editor
        .widget_action(image, WidgetAction::Align(Alignment::Right))
        .unwrap();
    assert_eq!(outcome, WidgetOutcome::Changed);
    assert!(editor.content().contains("data-align=\"right\""));
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn audio_speed_cycles_and_seek_is_clamped() {
    let media = RecordingMedia::default();
    let events = media.events.clone();
    let mut editor = mount_with_media(AUDIO, media);
    let widget = by_class(&editor, "note-audio")[0];
    let speed = by_class(&editor, "audio-speed")[0];

    assert_eq!(editor.click(speed).unwrap(), WidgetOutcome::Changed);
    let content = editor.content();
    assert!(content.contains("data-speed=\"1.25\""));
    assert!(content.contains(">1.25x</button>"));

    assert_eq!(
        editor.widget_action(widget, WidgetAction::Seek(500.0)).unwrap(),
        WidgetOutcome::Unchanged
    );
    assert_eq!(editor.widgets().players().get(widget).map(|p| p.position), Some(90.0));

    editor.widget_action(widget, WidgetAction::Seek(-3.0)).unwrap();
    assert_eq!(editor.widgets().players().get(widget).map(|p| p.position), Some(0.0));

    assert_eq!(
        *events.borrow(),
        vec!["rate 1 1.25", "seek 1 90", "seek 1 0"]
    );
}
