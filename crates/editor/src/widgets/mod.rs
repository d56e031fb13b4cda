mod attachment;
mod audio;
mod checklist;
mod image;
mod resize;

use std::collections::HashMap;

use note_markup::{Document, NodeId, Remap};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::WidgetLimits;
use crate::error::WidgetError;
use crate::files::Blob;
use crate::media::{MediaBackend, NullMedia, Players};

pub use attachment::build_attachment;
pub use audio::{SPEED_STEPS, build_audio, next_speed};
pub use checklist::{
    CHECKBOX_CLASS, CHECKED_CLASS, CHECKLIST_CLASS, ITEM_CLASS, ITEM_TEXT_CLASS, build_checklist,
    finish_item_split, is_checked,
};
pub use image::build_image;
pub use resize::{ResizeCommit, ResizeSession};

pub const WIDGET_ATTR: &str = "data-widget";
pub const SELECTED_CLASS: &str = "widget-selected";
pub const PLAYING_CLASS: &str = "is-playing";
pub const RESIZE_HANDLE_CLASS: &str = "resize-handle";
pub const TABLE_HANDLE_CLASS: &str = "table-resize-handle";
pub const DELETE_BUTTON_CLASS: &str = "widget-delete";

/// Classes that only describe live interaction state and never reach the
/// serialized document.
pub const TRANSIENT_CLASSES: &[&str] = &[SELECTED_CLASS, PLAYING_CLASS];

/// Presentation rules for widget chrome, injected once by the host.
pub const STYLESHEET: &str = r#"
[data-widget] { position: relative; user-select: none; }
[data-widget] .resize-handle,
[data-widget] .table-resize-handle,
[data-widget] .widget-delete { display: none; }
[data-widget].widget-selected { outline: 2px solid #3b82f6; }
[data-widget].widget-selected .resize-handle,
[data-widget].widget-selected .table-resize-handle,
[data-widget].widget-selected .widget-delete { display: block; }
.resize-handle { position: absolute; right: -6px; bottom: -6px; width: 12px; height: 12px; cursor: nwse-resize; }
.table-resize-handle { position: absolute; right: -4px; top: 0; bottom: 0; width: 8px; cursor: ew-resize; }
.note-image[data-align="left"] { text-align: left; }
.note-image[data-align="center"] { text-align: center; }
.note-image[data-align="right"] { text-align: right; }
ul.checklist { list-style: none; padding-left: 0; }
li.checklist-item.checked .checklist-text { text-decoration: line-through; opacity: 0.6; }
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Image,
    Table,
    Audio,
    Attachment,
    ChecklistItem,
}

impl WidgetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetKind::Image => "image",
            WidgetKind::Table => "table",
            WidgetKind::Audio => "audio",
            WidgetKind::Attachment => "attachment",
            WidgetKind::ChecklistItem => "checklist-item",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(WidgetKind::Image),
            "table" => Some(WidgetKind::Table),
            "audio" => Some(WidgetKind::Audio),
            "attachment" => Some(WidgetKind::Attachment),
            "checklist-item" => Some(WidgetKind::ChecklistItem),
            _ => None,
        }
    }

    /// Kind of the widget rooted exactly at `node`.
    pub fn of(doc: &Document, node: NodeId) -> Option<Self> {
        if let Some(kind) = doc.attr(node, WIDGET_ATTR).and_then(Self::parse) {
            return Some(kind);
        }
        (doc.is_element(node, "li") && doc.has_class(node, ITEM_CLASS))
            .then_some(WidgetKind::ChecklistItem)
    }
}

/// Innermost widget containing `node`.
pub fn widget_of(doc: &Document, node: NodeId) -> Option<(NodeId, WidgetKind)> {
    let widget = doc.closest(node, |d, n| WidgetKind::of(d, n).is_some())?;
    WidgetKind::of(doc, widget).map(|kind| (widget, kind))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "value")]
pub enum WidgetAction {
    Select,
    Delete,
    Align(Alignment),
    ToggleChecked,
    Play,
    Pause,
    Seek(f64),
    CycleSpeed,
    SetSpeed(f64),
    Download,
}

/// Payload-free key of a [`WidgetAction`], used by the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Select,
    Delete,
    Align,
    ToggleChecked,
    Play,
    Pause,
    Seek,
    CycleSpeed,
    SetSpeed,
    Download,
}

impl WidgetAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            WidgetAction::Select => ActionKind::Select,
            WidgetAction::Delete => ActionKind::Delete,
            WidgetAction::Align(_) => ActionKind::Align,
            WidgetAction::ToggleChecked => ActionKind::ToggleChecked,
            WidgetAction::Play => ActionKind::Play,
            WidgetAction::Pause => ActionKind::Pause,
            WidgetAction::Seek(_) => ActionKind::Seek,
            WidgetAction::CycleSpeed => ActionKind::CycleSpeed,
            WidgetAction::SetSpeed(_) => ActionKind::SetSpeed,
            WidgetAction::Download => ActionKind::Download,
        }
    }
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Select => "select",
            ActionKind::Delete => "delete",
            ActionKind::Align => "align",
            ActionKind::ToggleChecked => "toggle_checked",
            ActionKind::Play => "play",
            ActionKind::Pause => "pause",
            ActionKind::Seek => "seek",
            ActionKind::CycleSpeed => "cycle_speed",
            ActionKind::SetSpeed => "set_speed",
            ActionKind::Download => "download",
        }
    }
}

/// What an interaction did. `Changed` and `Removed` alter the serialized
/// document and must be committed.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetOutcome {
    Unchanged,
    Selected,
    Changed,
    Removed,
    Download(Blob),
}

impl WidgetOutcome {
    pub fn needs_commit(&self) -> bool {
        matches!(self, WidgetOutcome::Changed | WidgetOutcome::Removed)
    }
}

/// Everything a handler may touch.
pub struct WidgetCx<'a> {
    pub doc: &'a mut Document,
    pub media: &'a mut dyn MediaBackend,
    pub players: &'a mut Players,
    pub limits: &'a WidgetLimits,
}

pub type Handler =
    fn(&mut WidgetCx<'_>, NodeId, &WidgetAction) -> Result<WidgetOutcome, WidgetError>;

fn select(cx: &mut WidgetCx<'_>, widget: NodeId, _: &WidgetAction) -> Result<WidgetOutcome, WidgetError> {
    deselect_all(cx.doc);
    cx.doc.add_class(widget, SELECTED_CLASS)?;
    Ok(WidgetOutcome::Selected)
}

fn delete(cx: &mut WidgetCx<'_>, widget: NodeId, _: &WidgetAction) -> Result<WidgetOutcome, WidgetError> {
    release_media_in(cx, widget);
    cx.doc.detach(widget)?;
    Ok(WidgetOutcome::Removed)
}

/// Stops and releases every player inside `subtree` and clears the source
/// of its media elements.
fn release_media_in(cx: &mut WidgetCx<'_>, subtree: NodeId) {
    for node in cx.doc.descendants(subtree) {
        if WidgetKind::of(cx.doc, node) == Some(WidgetKind::Audio) {
            cx.players.release(node, cx.media);
        }
    }
    for media in cx.doc.find_all(subtree, |d, n| {
        d.is_element(n, "audio") || d.is_element(n, "video")
    }) {
        cx.doc.remove_attr(media, "src");
    }
}

pub fn deselect_all(doc: &mut Document) {
    let root = doc.root();
    for widget in doc.find_by_class(root, SELECTED_CLASS) {
        let _ = doc.remove_class(widget, SELECTED_CLASS);
    }
}

/// Handles are shown only on the selected widget.
pub fn handles_visible(doc: &Document, widget: NodeId) -> bool {
    doc.has_class(widget, SELECTED_CLASS)
}

/// `(kind, action) -> handler`, built once per editor.
pub struct DispatchTable {
    handlers: HashMap<(WidgetKind, ActionKind), Handler>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        let mut table = Self {
            handlers: HashMap::new(),
        };
        for kind in [
            WidgetKind::Image,
            WidgetKind::Table,
            WidgetKind::Audio,
            WidgetKind::Attachment,
        ] {
            table.register(kind, ActionKind::Select, select);
            table.register(kind, ActionKind::Delete, delete);
        }
        table.register(WidgetKind::ChecklistItem, ActionKind::Delete, delete);
        table.register(WidgetKind::Image, ActionKind::Align, image::align);
        table.register(WidgetKind::ChecklistItem, ActionKind::ToggleChecked, checklist::toggle);
        table.register(WidgetKind::Audio, ActionKind::Play, audio::play);
        table.register(WidgetKind::Audio, ActionKind::Pause, audio::pause);
        table.register(WidgetKind::Audio, ActionKind::Seek, audio::seek);
        table.register(WidgetKind::Audio, ActionKind::CycleSpeed, audio::cycle_speed);
        table.register(WidgetKind::Audio, ActionKind::SetSpeed, audio::set_speed);
        table.register(WidgetKind::Attachment, ActionKind::Download, attachment::download);
        table
    }
}

impl DispatchTable {
    pub fn register(&mut self, kind: WidgetKind, action: ActionKind, handler: Handler) {
        self.handlers.insert((kind, action), handler);
    }

    pub fn get(&self, kind: WidgetKind, action: ActionKind) -> Option<Handler> {
        self.handlers.get(&(kind, action)).copied()
    }

    pub fn supports(&self, kind: WidgetKind, action: ActionKind) -> bool {
        self.handlers.contains_key(&(kind, action))
    }
}

/// Owns widget behavior for one editor: the dispatch table, media players
/// and the resize session.
pub struct WidgetManager {
    table: DispatchTable,
    media: Box<dyn MediaBackend>,
    players: Players,
    limits: WidgetLimits,
    resize: Option<ResizeSession>,
    global_listeners: usize,
}

impl WidgetManager {
    pub fn new(limits: WidgetLimits) -> Self {
        Self::with_media(limits, Box::new(NullMedia))
    }

    pub fn with_media(limits: WidgetLimits, media: Box<dyn MediaBackend>) -> Self {
        let mut manager = Self {
            table: DispatchTable::default(),
            media,
            players: Players::default(),
            limits: WidgetLimits::default(),
            resize: None,
            global_listeners: 0,
        };
        manager.set_limits(limits);
        manager
    }

    pub fn limits(&self) -> &WidgetLimits {
        &self.limits
    }

    pub fn set_limits(&mut self, limits: WidgetLimits) {
        let normalized = limits.normalized();
        if normalized != limits {
            warn!(?limits, "widget limits normalized");
        }
        self.limits = normalized;
    }

    pub fn players(&self) -> &Players {
        &self.players
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.table
    }

    /// Runs `action` against the widget containing `target`.
    pub fn dispatch(
        &mut self,
        doc: &mut Document,
        target: NodeId,
        action: WidgetAction,
    ) -> Result<WidgetOutcome, WidgetError> {
        let (widget, kind) = widget_of(doc, target).ok_or(WidgetError::NotAWidget)?;
        let handler = self
            .table
            .get(kind, action.kind())
            .ok_or(WidgetError::Unsupported {
                kind: kind.as_str(),
                action: action.kind().as_str(),
            })?;
        trace!(kind = kind.as_str(), action = action.kind().as_str(), "widget action");
        let mut cx = WidgetCx {
            doc,
            media: self.media.as_mut(),
            players: &mut self.players,
            limits: &self.limits,
        };
        handler(&mut cx, widget, &action)
    }

    /// Root-level click delegation: maps the clicked node to an action of
    /// the widget it belongs to. Clicks outside any widget deselect all.
    pub fn click(
        &mut self,
        doc: &mut Document,
        target: NodeId,
    ) -> Result<WidgetOutcome, WidgetError> {
        let Some((widget, kind)) = widget_of(doc, target) else {
            deselect_all(doc);
            return Ok(WidgetOutcome::Unchanged);
        };

        let control = |class: &str| doc.closest_class(target, class).is_some();
        let action = if control(CHECKBOX_CLASS) {
            WidgetAction::ToggleChecked
        } else if control(audio::TOGGLE_CLASS) {
            match self.players.get(widget) {
                Some(player) if player.playing => WidgetAction::Pause,
                _ => WidgetAction::Play,
            }
        } else if control(audio::SPEED_CLASS) {
            WidgetAction::CycleSpeed
        } else if control(attachment::DOWNLOAD_CLASS) {
            WidgetAction::Download
        } else if control(DELETE_BUTTON_CLASS) {
            WidgetAction::Delete
        } else if kind == WidgetKind::ChecklistItem {
            return Ok(WidgetOutcome::Unchanged);
        } else {
            WidgetAction::Select
        };
        self.dispatch(doc, widget, action)
    }

    /// Binds every widget in `subtree` not bound yet. Returns how many were
    /// newly bound; running it again over the same nodes binds nothing.
    pub fn reattach(&mut self, doc: &mut Document, subtree: NodeId) -> usize {
        let mut bound = 0;
        for node in doc.descendants(subtree) {
            let Some(kind) = WidgetKind::of(doc, node) else {
                continue;
            };
            if doc.is_bound(node) {
                continue;
            }
            let repaired = match kind {
                WidgetKind::Image => image::repair(doc, node, &self.limits),
                WidgetKind::Audio => {
                    let rate = audio::speed_of(doc, node);
                    self.players.ensure(node, rate);
                    Ok(())
                }
                WidgetKind::ChecklistItem => checklist::mirror(doc, node),
                WidgetKind::Table | WidgetKind::Attachment => Ok(()),
            };
            if let Err(err) = repaired {
                debug!(kind = kind.as_str(), %err, "widget repair failed during reattach");
            }
            doc.set_bound(node, true);
            bound += 1;
        }
        if bound > 0 {
            trace!(bound, "widgets re-attached");
        }
        bound
    }

    /// Called before the surface content is replaced wholesale: every
    /// player belongs to nodes that are about to disappear.
    pub fn reset(&mut self) {
        let released = self.players.release_all(self.media.as_mut());
        if released > 0 {
            debug!(released, "media released before re-render");
        }
        if self.resize.take().is_some() {
            self.remove_global_listeners();
        }
    }

    /// Follows a document compaction.
    pub fn remap(&mut self, remap: &Remap) {
        self.players.remap(remap, self.media.as_mut());
        if self.resize.as_mut().is_some_and(|session| !session.remap(remap)) {
            self.resize = None;
            self.remove_global_listeners();
        }
    }

    pub fn resize_session(&self) -> Option<&ResizeSession> {
        self.resize.as_ref()
    }

    pub fn global_listeners(&self) -> usize {
        self.global_listeners
    }

    /// Pointer-down on a resize handle. Only one session may be active.
    pub fn begin_resize(
        &mut self,
        doc: &mut Document,
        handle: NodeId,
        pointer_x: f64,
        parent_width: f64,
    ) -> Result<(), WidgetError> {
        if self.resize.is_some() {
            debug!("resize session rejected: another one is active");
            return Err(WidgetError::ResizeInProgress);
        }
        let session = ResizeSession::begin(doc, handle, pointer_x, parent_width, &self.limits)?;
        select(
            &mut WidgetCx {
                doc,
                media: self.media.as_mut(),
                players: &mut self.players,
                limits: &self.limits,
            },
            session.widget(),
            &WidgetAction::Select,
        )?;
        self.resize = Some(session);
        self.global_listeners += 1;
        Ok(())
    }

    /// Pointer-move while resizing. Returns the live width, if a session is
    /// active.
    pub fn resize_move(
        &mut self,
        doc: &mut Document,
        pointer_x: f64,
    ) -> Result<Option<f64>, WidgetError> {
        let Some(session) = self.resize.as_mut() else {
            return Ok(None);
        };
        session.update(doc, pointer_x, &self.limits).map(Some)
    }

    /// Pointer-up or touch-end. Commits the width and ends the session.
    pub fn end_resize(&mut self, doc: &mut Document) -> Result<Option<ResizeCommit>, WidgetError> {
        let Some(session) = self.resize.take() else {
            return Ok(None);
        };
        self.remove_global_listeners();
        session.commit(doc).map(Some)
    }

    fn remove_global_listeners(&mut self) {
        self.global_listeners = self.global_listeners.saturating_sub(1);
    }
}
