use note_markup::{Document, NodeId, Remap};
use tracing::debug;

use super::{RESIZE_HANDLE_CLASS, TABLE_HANDLE_CLASS, WidgetKind, image, widget_of};
use crate::config::WidgetLimits;
use crate::error::WidgetError;
use crate::table;

/// Width committed at the end of a resize session: pixels for images,
/// percent of the parent width for tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeCommit {
    pub widget: NodeId,
    pub kind: WidgetKind,
    pub width: f64,
}

/// One drag of a resize handle, from pointer-down to pointer-up.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSession {
    widget: NodeId,
    kind: WidgetKind,
    start_x: f64,
    start_width: f64,
    parent_width: f64,
    width: f64,
}

impl ResizeSession {
    pub(super) fn begin(
        doc: &Document,
        handle: NodeId,
        pointer_x: f64,
        parent_width: f64,
        limits: &WidgetLimits,
    ) -> Result<Self, WidgetError> {
        let (widget, kind) = widget_of(doc, handle).ok_or(WidgetError::NotAWidget)?;
        let on_handle = |class: &str| doc.closest_class(handle, class).is_some();
        let start_width = match kind {
            WidgetKind::Image if on_handle(RESIZE_HANDLE_CLASS) => {
                image::width_of(doc, widget, limits)
            }
            WidgetKind::Table if on_handle(TABLE_HANDLE_CLASS) => doc
                .attr(widget, table::TABLE_WIDTH_ATTR)
                .and_then(note_markup::css_number)
                .unwrap_or(limits.table_max_pct),
            _ => return Err(WidgetError::NotResizable),
        };
        debug!(kind = kind.as_str(), start_width, "resize session started");
        Ok(Self {
            widget,
            kind,
            start_x: pointer_x,
            start_width,
            parent_width: parent_width.max(1.0),
            width: start_width,
        })
    }

    /// Follows a document compaction. False when the widget was freed.
    pub(super) fn remap(&mut self, remap: &Remap) -> bool {
        match remap.get(self.widget) {
            Some(widget) => {
                self.widget = widget;
                true
            }
            None => false,
        }
    }

    pub fn widget(&self) -> NodeId {
        self.widget
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    fn clamped(&self, pointer_x: f64, limits: &WidgetLimits) -> f64 {
        let delta = pointer_x - self.start_x;
        match self.kind {
            WidgetKind::Table => (self.start_width + delta / self.parent_width * 100.0)
                .clamp(limits.table_min_pct, limits.table_max_pct),
            _ => (self.start_width + delta).clamp(limits.image_min_px, limits.image_max_px),
        }
    }

    pub(super) fn update(
        &mut self,
        doc: &mut Document,
        pointer_x: f64,
        limits: &WidgetLimits,
    ) -> Result<f64, WidgetError> {
        if !pointer_x.is_finite() {
            return Ok(self.width);
        }
        self.width = self.clamped(pointer_x, limits);
        match self.kind {
            WidgetKind::Table => table::set_width_pct(doc, self.widget, self.width)?,
            _ => image::preview_width(doc, self.widget, self.width)?,
        }
        Ok(self.width)
    }

    pub(super) fn commit(self, doc: &mut Document) -> Result<ResizeCommit, WidgetError> {
        match self.kind {
            WidgetKind::Table => table::set_width_pct(doc, self.widget, self.width)?,
            _ => image::commit_width(doc, self.widget, self.width)?,
        }
        debug!(kind = self.kind.as_str(), width = self.width, "resize committed");
        Ok(ResizeCommit {
            widget: self.widget,
            kind: self.kind,
            width: self.width,
        })
    }
}
