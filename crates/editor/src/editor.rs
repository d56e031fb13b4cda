use note_markup::{NodeId, Remap};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::commands::CommandRegistry;
use crate::config::EditorConfig;
use crate::error::{EditorError, SurfaceError};
use crate::files::IncomingFile;
use crate::history::History;
use crate::host::{CommitOutcome, ContentHost, RenderOutcome};
use crate::media::{MediaBackend, NullMedia};
use crate::smart_links::{SmartDetector, SmartLink};
use crate::surface::{EditingPrimitives, Selection, Surface};
use crate::table::{TableMenu, TableMenuAction, TableStyle};
use crate::tasks::{Task, TaskQueue};
use crate::toolbar::ToolbarState;
use crate::widgets::{
    ITEM_CLASS, ResizeCommit, WidgetAction, WidgetManager, WidgetOutcome, build_attachment,
    build_audio, build_image, finish_item_split,
};

const COMPACT_MIN_NODES: usize = 4096;

/// One input event from the editable surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    InsertText(String),
    InsertParagraph,
    DeleteBackward,
}

/// A mounted editor for one note: the live surface, its history, commands,
/// widgets and link detection.
pub struct NoteEditor {
    host: ContentHost,
    history: History,
    commands: CommandRegistry,
    widgets: WidgetManager,
    detector: SmartDetector,
    tasks: TaskQueue,
    toolbar: ToolbarState,
    table_menu: Option<TableMenu>,
    /// Text node a line break was typed after, scanned with the next
    /// deferred detection pass.
    line_break: Option<NodeId>,
    config: EditorConfig,
}

impl NoteEditor {
    pub fn new(initial: &str, config: EditorConfig, on_change: impl FnMut(&str) + 'static) -> Self {
        Self::with_parts(
            initial,
            config,
            Box::new(on_change),
            Box::new(SystemClock),
            Box::new(NullMedia),
        )
    }

    pub fn with_parts(
        initial: &str,
        config: EditorConfig,
        on_change: Box<dyn FnMut(&str)>,
        clock: Box<dyn Clock>,
        media: Box<dyn MediaBackend>,
    ) -> Self {
        let host = ContentHost::new(initial, config.host, on_change, clock);
        let mut history = History::new(config.history);
        history.push(host.last_committed());

        let mut editor = Self {
            host,
            history,
            commands: CommandRegistry::default(),
            widgets: WidgetManager::with_media(config.widgets, media),
            detector: SmartDetector::new(config.smart_links),
            tasks: TaskQueue::default(),
            toolbar: ToolbarState::default(),
            table_menu: None,
            line_break: None,
            config,
        };
        editor.reattach();
        editor.tasks.schedule(Task::RefreshToolbar);
        editor
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EditorConfig) {
        self.host.set_config(config.host);
        self.history.set_config(config.history);
        self.widgets.set_limits(config.widgets);
        self.detector.set_config(config.smart_links);
        self.config = config;
    }

    pub fn surface(&self) -> &Surface {
        self.host.surface()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn widgets(&self) -> &WidgetManager {
        &self.widgets
    }

    pub fn toolbar_state(&self) -> &ToolbarState {
        &self.toolbar
    }

    pub fn table_menu(&self) -> Option<&TableMenu> {
        self.table_menu.as_ref()
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Live content with transient state stripped.
    pub fn content(&self) -> String {
        self.host.extract()
    }

    pub fn last_committed(&self) -> &str {
        self.host.last_committed()
    }

    fn reattach(&mut self) -> usize {
        let doc = self.host.surface_mut().doc_mut();
        let root = doc.root();
        self.widgets.reattach(doc, root)
    }

    /// Commits the surface and records the snapshot in history.
    fn commit(&mut self) -> CommitOutcome {
        let outcome = self.host.commit();
        if let Some(snapshot) = outcome.snapshot() {
            self.history.push(snapshot);
        }
        self.tasks.schedule(Task::RefreshToolbar);
        if self.is_sparse() {
            self.tasks.schedule(Task::Compact);
        }
        outcome
    }

    fn is_sparse(&self) -> bool {
        let doc = self.host.surface().doc();
        doc.len() >= COMPACT_MIN_NODES && doc.len() >= 2 * doc.attached_len()
    }

    /// Frees nodes that are no longer part of the document and renumbers the
    /// rest. Node ids held by the caller are invalid afterwards, as after a
    /// re-render; the selection, players, resize session and table menu
    /// follow their nodes.
    pub fn compact(&mut self) -> Remap {
        let before = self.host.surface().doc().len();
        let remap = self.host.surface_mut().compact();
        self.widgets.remap(&remap);
        self.line_break = self.line_break.and_then(|node| remap.get(node));
        self.table_menu = self.table_menu.take().and_then(|menu| {
            Some(TableMenu {
                table: remap.get(menu.table)?,
                ..menu
            })
        });
        debug!(before, after = self.host.surface().doc().len(), "document compacted");
        remap
    }

    /// Bookkeeping after the surface content was replaced wholesale.
    fn after_rerender(&mut self) {
        self.table_menu = None;
        self.line_break = None;
        self.reattach();
        self.tasks.schedule(Task::RefreshToolbar);
    }

    fn rerendered(&mut self, outcome: RenderOutcome) -> RenderOutcome {
        if outcome == RenderOutcome::Applied {
            self.widgets.reset();
            self.history.push(self.host.last_committed());
            self.after_rerender();
        }
        outcome
    }

    pub fn render_external(&mut self, content: &str) -> Result<RenderOutcome, EditorError> {
        let outcome = self.host.render_external(content)?;
        Ok(self.rerendered(outcome))
    }

    pub fn focus(&mut self) {
        self.host.focus();
    }

    pub fn blur(&mut self) -> RenderOutcome {
        let outcome = self.host.blur();
        self.rerendered(outcome)
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), EditorError> {
        self.host.surface_mut().set_selection(selection)?;
        self.tasks.schedule(Task::RefreshToolbar);
        Ok(())
    }

    pub fn composition_start(&mut self) {
        self.host.composition_start();
    }

    pub fn composition_end(&mut self) -> CommitOutcome {
        let outcome = self.host.composition_end();
        if let Some(snapshot) = outcome.snapshot() {
            self.history.push(snapshot);
        }
        self.tasks.schedule(Task::SmartScan);
        self.tasks.schedule(Task::RefreshToolbar);
        outcome
    }

    /// Applies one input event and commits it. One event yields at most one
    /// history entry.
    pub fn input(&mut self, event: InputEvent) -> Result<CommitOutcome, EditorError> {
        if !self.host.surface().is_focused() {
            self.host.focus();
        }
        let surface = self.host.surface_mut();
        match &event {
            InputEvent::InsertText(text) => {
                surface.insert_text(text)?;
                if !surface.is_composing() && text.ends_with(char::is_whitespace) {
                    self.tasks.schedule(Task::SmartScan);
                }
            }
            InputEvent::InsertParagraph => {
                let caret = surface.caret_text_position()?;
                let item = surface.doc().closest_class(caret.node, ITEM_CLASS);
                let new_block = surface.insert_paragraph()?;
                if !surface.is_composing() {
                    self.line_break = Some(caret.node);
                    self.tasks.schedule(Task::SmartScan);
                }
                if item.is_some() {
                    finish_item_split(surface.doc_mut(), new_block)?;
                    self.tasks.schedule(Task::Reattach);
                }
            }
            InputEvent::DeleteBackward => surface.delete_backward()?,
        }
        Ok(self.commit())
    }

    /// Runs a named command against the current selection and commits.
    pub fn execute(&mut self, id: &str, args: Option<Value>) -> Result<(), EditorError> {
        let surface = self.host.surface_mut();
        let saved = surface.selection();
        if !surface.is_focused() {
            surface.focus();
            if let Some(selection) = saved
                && let Err(err) = surface.set_selection(selection)
            {
                debug!(%err, "saved selection could not be restored");
            }
        }
        if let Err(err) = self.commands.run(surface, id, args) {
            warn!(command = id, %err, "command failed");
            return Err(err.into());
        }
        self.commit();
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo().map(str::to_string) else {
            return false;
        };
        self.restore(&snapshot);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo().map(str::to_string) else {
            return false;
        };
        self.restore(&snapshot);
        true
    }

    fn restore(&mut self, snapshot: &str) {
        self.widgets.reset();
        self.host.restore(snapshot);
        self.host.surface_mut().select_end();
        self.after_rerender();
    }

    fn insert_widget(&mut self, widget: NodeId) -> Result<NodeId, EditorError> {
        let surface = self.host.surface_mut();
        if !surface.is_focused() {
            surface.focus();
        }
        surface.insert_node_at_selection(widget)?;
        self.widgets.reattach(surface.doc_mut(), widget);
        self.commit();
        Ok(widget)
    }

    pub fn insert_image(&mut self, file: &IncomingFile) -> Result<NodeId, EditorError> {
        let doc = self.host.surface_mut().doc_mut();
        let widget = build_image(doc, file, self.widgets.limits()).inspect_err(|err| {
            warn!(name = %file.name, %err, "image rejected");
        })?;
        self.insert_widget(widget)
    }

    pub fn insert_attachment(&mut self, file: &IncomingFile) -> Result<NodeId, EditorError> {
        let doc = self.host.surface_mut().doc_mut();
        let widget = build_attachment(doc, file, self.widgets.limits()).inspect_err(|err| {
            warn!(name = %file.name, %err, "attachment rejected");
        })?;
        self.insert_widget(widget)
    }

    pub fn insert_audio(
        &mut self,
        recording: &IncomingFile,
        duration: f64,
    ) -> Result<NodeId, EditorError> {
        let doc = self.host.surface_mut().doc_mut();
        let widget = build_audio(doc, recording, duration, self.widgets.limits())
            .inspect_err(|err| warn!(%err, "recording rejected"))?;
        self.insert_widget(widget)
    }

    pub fn insert_table(
        &mut self,
        rows: usize,
        cols: usize,
        style: TableStyle,
    ) -> Result<(), EditorError> {
        self.execute(
            "table",
            Some(json!({ "rows": rows, "cols": cols, "style": style.as_str() })),
        )
    }

    pub fn insert_checklist(&mut self) -> Result<(), EditorError> {
        self.execute("checklist", None)
    }

    pub fn widget_action(
        &mut self,
        target: NodeId,
        action: WidgetAction,
    ) -> Result<WidgetOutcome, EditorError> {
        let doc = self.host.surface_mut().doc_mut();
        let outcome = self.widgets.dispatch(doc, target, action)?;
        if outcome.needs_commit() {
            self.commit();
        }
        Ok(outcome)
    }

    /// Root-level click delegation.
    pub fn click(&mut self, target: NodeId) -> Result<WidgetOutcome, EditorError> {
        let doc = self.host.surface_mut().doc_mut();
        let outcome = self.widgets.click(doc, target)?;
        if outcome.needs_commit() {
            self.commit();
        }
        Ok(outcome)
    }

    pub fn pointer_down(
        &mut self,
        handle: NodeId,
        pointer_x: f64,
        parent_width: f64,
    ) -> Result<(), EditorError> {
        let doc = self.host.surface_mut().doc_mut();
        self.widgets
            .begin_resize(doc, handle, pointer_x, parent_width)
            .map_err(Into::into)
    }

    pub fn pointer_move(&mut self, pointer_x: f64) -> Result<Option<f64>, EditorError> {
        let doc = self.host.surface_mut().doc_mut();
        self.widgets.resize_move(doc, pointer_x).map_err(Into::into)
    }

    /// Pointer-up or touch-end: commits the resized width.
    pub fn pointer_up(&mut self) -> Result<Option<ResizeCommit>, EditorError> {
        let doc = self.host.surface_mut().doc_mut();
        let committed = self.widgets.end_resize(doc)?;
        if committed.is_some() {
            self.commit();
        }
        Ok(committed)
    }

    pub fn open_table_menu(&mut self, target: NodeId, position: (f64, f64)) -> Option<TableMenu> {
        self.table_menu = TableMenu::open(self.host.surface().doc(), target, position);
        self.table_menu
    }

    pub fn table_menu_action(&mut self, action: TableMenuAction) -> Result<bool, EditorError> {
        let menu = self.table_menu.take().ok_or(EditorError::NoTableMenu)?;
        let surface = self.host.surface_mut();
        let changed = menu.apply(surface.doc_mut(), action)?;
        if let Some(selection) = surface.selection()
            && !surface.doc().is_attached(selection.focus.node)
        {
            surface.clear_selection();
        }
        if changed {
            self.commit();
        }
        Ok(changed)
    }

    /// Closing the menu recommits whatever the table looks like now.
    pub fn dismiss_table_menu(&mut self) -> CommitOutcome {
        self.table_menu = None;
        self.commit()
    }

    pub fn highlight(&mut self, query: &str) -> Result<usize, EditorError> {
        Ok(self.host.highlight(query)?)
    }

    pub fn clear_highlights(&mut self) -> Result<RenderOutcome, EditorError> {
        let outcome = self.host.clear_highlights()?;
        Ok(self.rerendered(outcome))
    }

    /// Delivers a debounced commit whose deadline has passed.
    pub fn tick(&mut self) -> Option<String> {
        self.host.flush_due()
    }

    pub fn flush(&mut self) -> Option<String> {
        self.host.flush()
    }

    /// Runs deferred work queued by earlier events, in order.
    pub fn run_pending(&mut self) {
        while let Some(task) = self.tasks.pop() {
            match task {
                Task::RefreshToolbar => {
                    let mut state = ToolbarState::compute(self.host.surface());
                    state.can_undo = self.history.can_undo();
                    state.can_redo = self.history.can_redo();
                    self.toolbar = state;
                }
                Task::SmartScan => match self.smart_scan() {
                    Ok(Some(link)) => {
                        debug!(kind = link.kind.as_str(), "smart link inserted");
                        self.commit();
                    }
                    Ok(None) => {}
                    Err(err) => warn!(%err, "smart detection failed"),
                },
                Task::Reattach => {
                    self.reattach();
                }
                Task::Compact => {
                    if self.is_sparse() {
                        self.compact();
                    }
                }
            }
        }
    }

    fn smart_scan(&mut self) -> Result<Option<SmartLink>, SurfaceError> {
        if let Some(node) = self.line_break.take() {
            let surface = self.host.surface_mut();
            if !surface.is_composing() && surface.doc().is_attached(node) {
                let link = self.detector.scan_line_end(surface.doc_mut(), node)?;
                if link.is_some() {
                    return Ok(link);
                }
            }
        }
        let surface = self.host.surface_mut();
        if surface.is_composing() || surface.selection().is_none_or(|s| !s.is_collapsed()) {
            return Ok(None);
        }
        let caret = surface.caret_text_position()?;
        let link = self.detector.scan(surface.doc_mut(), caret.node, caret.offset)?;
        if let Some(link) = &link {
            surface.set_selection(Selection::collapsed(link.caret))?;
        }
        Ok(link)
    }
}
