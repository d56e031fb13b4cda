use note_markup::{Document, NodeId, css_number};

use super::{
    Alignment, DELETE_BUTTON_CLASS, RESIZE_HANDLE_CLASS, WIDGET_ATTR, WidgetAction, WidgetCx,
    WidgetKind, WidgetOutcome,
};
use crate::config::WidgetLimits;
use crate::error::WidgetError;
use crate::files::{IncomingFile, to_data_uri, validate_kind};

pub const IMAGE_CLASS: &str = "note-image";
pub const WIDTH_ATTR: &str = "data-width";
pub const ALIGN_ATTR: &str = "data-align";

fn px(width: f64) -> String {
    format!("{}px", width.round() as i64)
}

/// Validates an image file and builds a detached image widget for it.
pub fn build_image(
    doc: &mut Document,
    file: &IncomingFile,
    limits: &WidgetLimits,
) -> Result<NodeId, WidgetError> {
    validate_kind(file, limits.max_file_bytes, "image")?;
    let width = limits
        .image_default_px
        .clamp(limits.image_min_px, limits.image_max_px);

    let container = doc.create_element("div");
    doc.set_attr(container, "class", IMAGE_CLASS)?;
    doc.set_attr(container, WIDGET_ATTR, WidgetKind::Image.as_str())?;
    doc.set_attr(container, WIDTH_ATTR, format!("{}", width.round() as i64))?;
    doc.set_attr(container, ALIGN_ATTR, Alignment::Center.as_str())?;
    doc.set_attr(container, "contenteditable", "false")?;

    let img = doc.create_element("img");
    doc.set_attr(img, "src", to_data_uri(file.mime_or_default(), &file.bytes))?;
    doc.set_attr(img, "alt", file.name.as_str())?;
    doc.set_attr(img, "style", format!("width: {};", px(width)))?;

    let handle = doc.create_element("span");
    doc.set_attr(handle, "class", RESIZE_HANDLE_CLASS)?;
    let delete = doc.create_element("button");
    doc.set_attr(delete, "class", DELETE_BUTTON_CLASS)?;
    doc.set_attr(delete, "type", "button")?;

    doc.append_child(container, img)?;
    doc.append_child(container, handle)?;
    doc.append_child(container, delete)?;
    Ok(container)
}

pub(super) fn img_of(doc: &Document, container: NodeId) -> Option<NodeId> {
    doc.find_first(container, |d, n| d.is_element(n, "img"))
}

/// Committed width, falling back to the inline style and then the default.
pub(super) fn width_of(doc: &Document, container: NodeId, limits: &WidgetLimits) -> f64 {
    doc.attr(container, WIDTH_ATTR)
        .and_then(css_number)
        .or_else(|| {
            img_of(doc, container)
                .and_then(|img| doc.style_property(img, "width"))
                .and_then(|w| css_number(&w))
        })
        .unwrap_or(limits.image_default_px)
}

/// Live width shown while dragging; not committed.
pub(super) fn preview_width(doc: &mut Document, container: NodeId, width: f64) -> Result<(), WidgetError> {
    let img = img_of(doc, container).ok_or(WidgetError::NotAWidget)?;
    doc.set_style_property(img, "width", &px(width))?;
    Ok(())
}

pub(super) fn commit_width(doc: &mut Document, container: NodeId, width: f64) -> Result<(), WidgetError> {
    preview_width(doc, container, width)?;
    doc.set_attr(container, WIDTH_ATTR, format!("{}", width.round() as i64))?;
    Ok(())
}

/// Restores chrome that older markup may lack and re-derives the image
/// width from `data-width`.
pub(super) fn repair(doc: &mut Document, container: NodeId, limits: &WidgetLimits) -> Result<(), WidgetError> {
    if doc.find_by_class(container, RESIZE_HANDLE_CLASS).is_empty() {
        let handle = doc.create_element("span");
        doc.set_attr(handle, "class", RESIZE_HANDLE_CLASS)?;
        doc.append_child(container, handle)?;
    }
    let width = width_of(doc, container, limits);
    let img = img_of(doc, container).ok_or(WidgetError::NotAWidget)?;
    if doc.style_property(img, "width").as_deref() != Some(px(width).as_str()) {
        doc.set_style_property(img, "width", &px(width))?;
    }
    Ok(())
}

pub(super) fn align(
    cx: &mut WidgetCx<'_>,
    widget: NodeId,
    action: &WidgetAction,
) -> Result<WidgetOutcome, WidgetError> {
    let WidgetAction::Align(alignment) = action else {
        return Ok(WidgetOutcome::Unchanged);
    };
    if cx.doc.attr(widget, ALIGN_ATTR) == Some(alignment.as_str()) {
        return Ok(WidgetOutcome::Unchanged);
    }
    cx.doc.set_attr(widget, ALIGN_ATTR, alignment.as_str())?;
    Ok(WidgetOutcome::Changed)
}
