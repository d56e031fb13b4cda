use note_markup::{Document, MarkupError};

#[test]
fn split_text_keeps_both_halves_in_order() {
    let mut doc = Document::parse("<p>hello world</p>");
    let p = doc.children(doc.root())[0];
    let text = doc.children(p)[0];

    let tail = doc.split_text(text, 5).unwrap();
    assert_eq!(doc.text(text), Some("hello"));
    assert_eq!(doc.text(tail), Some(" world"));
    assert_eq!(doc.children(p), &[text, tail]);
    assert_eq!(doc.to_markup(), "<p>hello world</p>");
}

#[test]
fn split_text_clamps_inside_multibyte_chars() {
    let mut doc = Document::parse("<p>héllo</p>");
    let p = doc.children(doc.root())[0];
    let text = doc.children(p)[0];
    let tail = doc.split_text(text, 2).unwrap();
    assert_eq!(doc.text(text), Some("h"));
    assert_eq!(doc.text(tail), Some("éllo"));
}

#[test]
fn wrap_and_unwrap_are_inverse() {
    let mut doc = Document::parse("<p>a b c</p>");
    let p = doc.children(doc.root())[0];
    let text = doc.children(p)[0];
    let b = doc.create_element("b");
    doc.wrap(text, b).unwrap();
    assert_eq!(doc.to_markup(), "<p><b>a b c</b></p>");
    doc.unwrap(b).unwrap();
    assert_eq!(doc.to_markup(), "<p>a b c</p>");
}

#[test]
fn isolate_extracts_a_node_from_nested_ancestors() {
    let mut doc = Document::parse("<p><b>one <i>two</i> three</b></p>");
    let p = doc.children(doc.root())[0];
    let b = doc.children(p)[0];
    let i = doc.children(b)[1];
    let two = doc.children(i)[0];

    doc.isolate(two, b).unwrap();
    assert_eq!(
        doc.to_markup(),
        "<p><b>one </b><b><i>two</i></b><b> three</b></p>"
    );
    doc.unwrap(b).unwrap();
    assert_eq!(doc.to_markup(), "<p><b>one </b><i>two</i><b> three</b></p>");
}

#[test]
fn inserting_an_ancestor_below_itself_is_rejected() {
    let mut doc = Document::parse("<div><p>x</p></div>");
    let div = doc.children(doc.root())[0];
    let p = doc.children(div)[0];
    assert_eq!(doc.append_child(p, div), Err(MarkupError::Cycle(div.index())));
}

#[test]
fn class_and_style_helpers_edit_attributes_in_place() {
    let mut doc = Document::parse("<div class=\"a\" style=\"width: 10px;\">x</div>");
    let div = doc.children(doc.root())[0];
    doc.add_class(div, "b").unwrap();
    assert!(doc.toggle_class(div, "c").unwrap());
    assert!(!doc.toggle_class(div, "a").unwrap());
    doc.set_style_property(div, "width", "20px").unwrap();
    doc.set_style_property(div, "margin", "0 auto").unwrap();
    assert_eq!(
        doc.to_markup(),
        "<div class=\"b c\" style=\"width: 20px; margin: 0 auto;\">x</div>"
    );
    assert_eq!(doc.style_property(div, "width").as_deref(), Some("20px"));
}

#[test]
fn detached_nodes_are_not_attached_but_stay_addressable() {
    let mut doc = Document::parse("<p>x</p>");
    let p = doc.children(doc.root())[0];
    doc.detach(p).unwrap();
    assert!(!doc.is_attached(p));
    assert_eq!(doc.outer_html(p), "<p>x</p>");
    assert!(doc.is_empty());
}

#[test]
fn compaction_frees_detached_nodes_and_remaps_the_rest() {
    let mut doc = Document::parse("<p>a b c</p><p>gone</p>");
    let root = doc.root();
    let first = doc.children(root)[0];
    let second = doc.children(root)[1];
    let text = doc.children(first)[0];
    for _ in 0..10 {
        let mark = doc.create_element("mark");
        doc.wrap(text, mark).unwrap();
        doc.unwrap(mark).unwrap();
    }
    doc.detach(second).unwrap();
    let markup = doc.to_markup();
    assert!(doc.len() > doc.attached_len());

    let remap = doc.compact();

    assert_eq!(doc.len(), doc.attached_len());
    assert_eq!(doc.len(), 3);
    assert_eq!(doc.to_markup(), markup);
    assert_eq!(remap.get(root), Some(doc.root()));
    let text = remap.get(text).unwrap();
    assert_eq!(doc.text(text), Some("a b c"));
    assert_eq!(doc.parent(text), remap.get(first));
    assert_eq!(remap.get(second), None);
}
