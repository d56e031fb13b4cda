use note_markup::{Document, NodeId};

use super::{WidgetAction, WidgetCx, WidgetOutcome};
use crate::error::WidgetError;

pub const CHECKLIST_CLASS: &str = "checklist";
pub const ITEM_CLASS: &str = "checklist-item";
pub const CHECKBOX_CLASS: &str = "checklist-checkbox";
pub const ITEM_TEXT_CLASS: &str = "checklist-text";
pub const CHECKED_CLASS: &str = "checked";

fn new_checkbox(doc: &mut Document) -> Result<NodeId, WidgetError> {
    let checkbox = doc.create_element("input");
    doc.set_attr(checkbox, "type", "checkbox")?;
    doc.set_attr(checkbox, "class", CHECKBOX_CLASS)?;
    Ok(checkbox)
}

fn new_item(doc: &mut Document, text: &str) -> Result<(NodeId, NodeId), WidgetError> {
    let item = doc.create_element("li");
    doc.set_attr(item, "class", ITEM_CLASS)?;
    let checkbox = new_checkbox(doc)?;
    let span = doc.create_element("span");
    doc.set_attr(span, "class", ITEM_TEXT_CLASS)?;
    if !text.is_empty() {
        let text = doc.create_text(text);
        doc.append_child(span, text)?;
    }
    doc.append_child(item, checkbox)?;
    doc.append_child(item, span)?;
    Ok((item, span))
}

/// Builds a detached checklist with one unchecked item per entry (at least
/// one). Returns the list and the text span of its first item.
pub fn build_checklist(doc: &mut Document, items: &[&str]) -> Result<(NodeId, NodeId), WidgetError> {
    let list = doc.create_element("ul");
    doc.set_attr(list, "class", CHECKLIST_CLASS)?;
    let mut first_span = None;
    for text in if items.is_empty() { &[""][..] } else { items } {
        let (item, span) = new_item(doc, text)?;
        doc.append_child(list, item)?;
        first_span.get_or_insert(span);
    }
    let span = first_span.ok_or(WidgetError::NotAWidget)?;
    Ok((list, span))
}

pub fn is_checked(doc: &Document, item: NodeId) -> bool {
    doc.has_class(item, CHECKED_CLASS)
}

fn checkbox_of(doc: &Document, item: NodeId) -> Option<NodeId> {
    doc.find_by_class(item, CHECKBOX_CLASS).first().copied()
}

/// Copies the item's `checked` class onto its checkbox control.
pub(super) fn mirror(doc: &mut Document, item: NodeId) -> Result<(), WidgetError> {
    let checked = is_checked(doc, item);
    let checkbox = match checkbox_of(doc, item) {
        Some(checkbox) => checkbox,
        None => {
            let checkbox = new_checkbox(doc)?;
            doc.insert_child(item, 0, checkbox)?;
            checkbox
        }
    };
    match (checked, doc.attr(checkbox, "checked").is_some()) {
        (true, false) => doc.set_attr(checkbox, "checked", "")?,
        (false, true) => {
            doc.remove_attr(checkbox, "checked");
        }
        _ => {}
    }
    Ok(())
}

pub(super) fn toggle(
    cx: &mut WidgetCx<'_>,
    item: NodeId,
    _: &WidgetAction,
) -> Result<WidgetOutcome, WidgetError> {
    cx.doc.toggle_class(item, CHECKED_CLASS)?;
    mirror(cx.doc, item)?;
    Ok(WidgetOutcome::Changed)
}

/// Normalizes the second half of an item split by Enter: a new item starts
/// unchecked and gets its own checkbox.
pub fn finish_item_split(doc: &mut Document, new_item: NodeId) -> Result<(), WidgetError> {
    doc.remove_class(new_item, CHECKED_CLASS)?;
    for stray in doc.find_by_class(new_item, CHECKBOX_CLASS) {
        doc.detach(stray)?;
    }
    let checkbox = new_checkbox(doc)?;
    doc.insert_child(new_item, 0, checkbox)?;
    if doc.find_by_class(new_item, ITEM_TEXT_CLASS).is_empty() {
        let span = doc.create_element("span");
        doc.set_attr(span, "class", ITEM_TEXT_CLASS)?;
        for child in doc.children(new_item)[1..].to_vec() {
            doc.append_child(span, child)?;
        }
        doc.append_child(new_item, span)?;
    }
    doc.set_bound(new_item, false);
    Ok(())
}
