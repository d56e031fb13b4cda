use note_markup::{Document, NodeId};

use super::{DELETE_BUTTON_CLASS, WIDGET_ATTR, WidgetAction, WidgetCx, WidgetKind, WidgetOutcome};
use crate::config::WidgetLimits;
use crate::error::WidgetError;
use crate::files::{Blob, IncomingFile, decode_data_uri, format_size, to_data_uri, validate};

pub const ATTACHMENT_CLASS: &str = "note-attachment";
pub(super) const DOWNLOAD_CLASS: &str = "attachment-download";

pub fn build_attachment(
    doc: &mut Document,
    file: &IncomingFile,
    limits: &WidgetLimits,
) -> Result<NodeId, WidgetError> {
    validate(file, limits.max_file_bytes)?;
    let mime = file.mime_or_default();

    let container = doc.create_element("div");
    doc.set_attr(container, "class", ATTACHMENT_CLASS)?;
    doc.set_attr(container, WIDGET_ATTR, WidgetKind::Attachment.as_str())?;
    doc.set_attr(container, "data-name", file.name.as_str())?;
    doc.set_attr(container, "data-type", mime)?;
    doc.set_attr(container, "data-size", file.bytes.len().to_string())?;
    doc.set_attr(container, "data-src", to_data_uri(mime, &file.bytes))?;
    doc.set_attr(container, "contenteditable", "false")?;

    let name = doc.create_element("span");
    doc.set_attr(name, "class", "attachment-name")?;
    let name_text = doc.create_text(file.name.as_str());
    doc.append_child(name, name_text)?;

    let size = doc.create_element("span");
    doc.set_attr(size, "class", "attachment-size")?;
    let size_text = doc.create_text(format_size(file.bytes.len()));
    doc.append_child(size, size_text)?;

    let download = doc.create_element("button");
    doc.set_attr(download, "class", DOWNLOAD_CLASS)?;
    doc.set_attr(download, "type", "button")?;

    let delete = doc.create_element("button");
    doc.set_attr(delete, "class", DELETE_BUTTON_CLASS)?;
    doc.set_attr(delete, "type", "button")?;

    for child in [name, size, download, delete] {
        doc.append_child(container, child)?;
    }
    Ok(container)
}

/// Re-materializes the stored data URI as a downloadable blob.
pub(super) fn download(
    cx: &mut WidgetCx<'_>,
    widget: NodeId,
    _: &WidgetAction,
) -> Result<WidgetOutcome, WidgetError> {
    let src = cx.doc.attr(widget, "data-src").unwrap_or_default();
    let (mime, bytes) = decode_data_uri(src)?;
    let name = cx
        .doc
        .attr(widget, "data-name")
        .filter(|n| !n.is_empty())
        .unwrap_or("attachment")
        .to_string();
    let mime = cx
        .doc
        .attr(widget, "data-type")
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or(mime);
    Ok(WidgetOutcome::Download(Blob { name, mime, bytes }))
}
