use note_editor::markup::{Document, NodeId};
use note_editor::{
    ColumnPlacement, CommandError, EditorConfig, EditorError, NoteEditor, RowPlacement,
    Selection, TableMenu, TableMenuAction, TableStyle, build_table, delete_column, delete_row,
    dimensions, generate_table_html, insert_column, insert_row, rows,
};
use serde_json::json;

fn attached_table(rows: usize, cols: usize, style: TableStyle) -> (Document, NodeId) {
    let mut doc = Document::new();
    let wrapper = build_table(&mut doc, rows, cols, style);
    let root = doc.root();
    doc.append_child(root, wrapper).unwrap();
    (doc, wrapper)
}

fn cell(doc: &Document, wrapper: NodeId, row: usize, col: usize) -> NodeId {
    doc.children(rows(doc, wrapper)[row])[col]
}

#[test]
fn generated_table_has_one_header_row() {
    let html = generate_table_html(3, 3, TableStyle::Default);

    assert!(html.starts_with(concat!(
        "<div class=\"note-table-wrapper\" data-widget=\"table\" data-table-style=\"default\" ",
        "data-width=\"100\" style=\"width: 100%;\" contenteditable=\"false\">",
        "<table class=\"note-table table-style-default\"><thead><tr><th contenteditable=\"true\"",
    )));
    assert_eq!(html.matches("<th ").count(), 3);
    assert_eq!(html.matches("<td ").count(), 6);
    assert_eq!(html.matches("<br>").count(), 9);
    assert!(html.ends_with("</table><span class=\"table-resize-handle\"></span></div>"));
}

#[test]
fn presets_only_change_presentation() {
    let striped = generate_table_html(4, 2, TableStyle::Striped);
    assert_eq!(
        striped
            .matches("<tr style=\"background-color: #f3f4f6;\">")
            .count(),
        1
    );

    let shadow = generate_table_html(2, 2, TableStyle::Shadow);
    assert!(shadow.contains("box-shadow"));

    for style in [TableStyle::Bordered, TableStyle::Minimal] {
        let html = generate_table_html(2, 2, style);
        assert_eq!(html.matches("<tr").count(), 2);
        assert_eq!(html.matches("<th ").count(), 2);
    }
}

#[test]
fn sizes_are_clamped() {
    let (doc, wrapper) = attached_table(0, 100, TableStyle::Default);
    assert_eq!(dimensions(&doc, wrapper), (1, 16));
}

#[test]
fn deleting_the_header_promotes_the_first_body_row() {
    let (mut doc, wrapper) = attached_table(3, 2, TableStyle::Default);
    let before = rows(&doc, wrapper);

    assert!(delete_row(&mut doc, wrapper, 0).unwrap());

    let after = rows(&doc, wrapper);
    assert_eq!(after, before[1..].to_vec());
    let header = after[0];
    assert!(doc.is_element(doc.parent(header).unwrap(), "thead"));
    assert!(doc.children(header).iter().all(|&c| doc.is_element(c, "th")));
    assert_eq!(dimensions(&doc, wrapper), (2, 2));
}

#[test]
fn the_last_row_and_column_cannot_be_deleted() {
    let (mut doc, wrapper) = attached_table(1, 1, TableStyle::Default);

    assert!(!delete_row(&mut doc, wrapper, 0).unwrap());
    assert!(!delete_column(&mut doc, wrapper, 0).unwrap());
    assert_eq!(dimensions(&doc, wrapper), (1, 1));
}

#[test]
fn rows_and_columns_are_inserted_around_the_reference() {
    let (mut doc, wrapper) = attached_table(2, 2, TableStyle::Default);
    let body_row = rows(&doc, wrapper)[1];

    let below = insert_row(&mut doc, wrapper, 1, RowPlacement::Below).unwrap();
    assert_eq!(rows(&doc, wrapper)[2], below);
    assert_eq!(doc.prev_sibling(below), Some(body_row));

    let above_header = insert_row(&mut doc, wrapper, 0, RowPlacement::Above).unwrap();
    let all = rows(&doc, wrapper);
    assert_eq!(all[1], above_header);
    assert!(doc.is_element(doc.parent(above_header).unwrap(), "tbody"));

    insert_column(&mut doc, wrapper, 0, ColumnPlacement::Left).unwrap();
    assert_eq!(dimensions(&doc, wrapper), (4, 3));
    assert!(doc.is_element(cell(&doc, wrapper, 0, 0), "th"));
    assert!(doc.is_element(cell(&doc, wrapper, 1, 0), "td"));

    assert!(delete_column(&mut doc, wrapper, 2).unwrap());
    assert_eq!(dimensions(&doc, wrapper), (4, 2));
}

#[test]
fn striping_follows_row_changes() {
    let (mut doc, wrapper) = attached_table(3, 1, TableStyle::Striped);
    let striped = |doc: &Document| {
        rows(doc, wrapper)
            .into_iter()
            .map(|r| doc.attr(r, "style").is_some())
            .collect::<Vec<_>>()
    };
    assert_eq!(striped(&doc), vec![false, false, true]);

    insert_row(&mut doc, wrapper, 1, RowPlacement::Above).unwrap();
    assert_eq!(striped(&doc), vec![false, false, true, false]);
}

#[test]
fn menu_targets_the_clicked_cell() {
    let (mut doc, wrapper) = attached_table(3, 3, TableStyle::Default);
    let target = doc.children(cell(&doc, wrapper, 1, 2))[0];

    let menu = TableMenu::open(&doc, target, (10.0, 20.0)).unwrap();
    assert_eq!(menu.table, wrapper);
    assert_eq!((menu.row, menu.col), (1, 2));
    assert_eq!(menu.position, (10.0, 20.0));

    let root = doc.root();
    assert!(TableMenu::open(&doc, root, (0.0, 0.0)).is_none());

    assert!(menu.apply(&mut doc, TableMenuAction::DeleteTable).unwrap());
    assert!(!doc.is_attached(wrapper));
    assert!(menu.apply(&mut doc, TableMenuAction::DeleteRow).is_err());
}

#[test]
fn inserting_a_table_from_the_editor() {
    let mut editor = NoteEditor::new("<p>x</p>", EditorConfig::default(), |_: &str| {});
    let text = {
        let doc = editor.surface().doc();
        doc.text_nodes_in(doc.root())[0]
    };
    editor.set_selection(Selection::caret(text, 1)).unwrap();

    editor.insert_table(3, 3, TableStyle::Striped).unwrap();

    let content = editor.content();
    assert!(content.starts_with("<p>x</p><div class=\"note-table-wrapper\""));
    assert!(content.contains("data-table-style=\"striped\""));
    assert!(content.ends_with("</div><p></p>"));

    let doc = editor.surface().doc();
    let wrapper = doc.find_by_class(doc.root(), "note-table-wrapper")[0];
    let first_cell = cell(doc, wrapper, 0, 0);
    assert_eq!(editor.surface().selection(), Some(Selection::caret(first_cell, 0)));
}

#[test]
fn unknown_table_style_is_rejected() {
    let mut editor = NoteEditor::new("<p>x</p>", EditorConfig::default(), |_: &str| {});
    assert!(matches!(
        editor.execute("table", Some(json!({ "style": "neon" }))),
        Err(EditorError::Command(CommandError::InvalidArgument { .. }))
    ));
    assert_eq!(editor.content(), "<p>x</p>");
}

#[test]
fn menu_actions_commit_and_dismissal_recommits_nothing_new() {
    let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::<String>::new()));
    let sink = log.clone();
    let table = generate_table_html(3, 3, TableStyle::Default);
    let mut editor = NoteEditor::new(&table, EditorConfig::default(), move |content: &str| {
        sink.borrow_mut().push(content.to_string())
    });
    let (wrapper, target) = {
        let doc = editor.surface().doc();
        let wrapper = doc.find_by_class(doc.root(), "note-table-wrapper")[0];
        (wrapper, cell(doc, wrapper, 1, 0))
    };

    let menu = editor.open_table_menu(target, (0.0, 0.0)).unwrap();
    assert_eq!((menu.row, menu.col), (1, 0));

    assert!(editor.table_menu_action(TableMenuAction::InsertRowBelow).unwrap());
    assert_eq!(dimensions(editor.surface().doc(), wrapper), (4, 3));
    assert!(editor.table_menu().is_none());
    assert_eq!(log.borrow().len(), 1);

    assert!(matches!(
        editor.table_menu_action(TableMenuAction::DeleteRow),
        Err(EditorError::NoTableMenu)
    ));

    editor.open_table_menu(target, (0.0, 0.0));
    assert_eq!(
        editor.dismiss_table_menu(),
        note_editor::CommitOutcome::Unchanged
    );
    assert_eq!(log.borrow().len(), 1);
}
