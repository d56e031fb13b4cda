use std::time::Instant;

use note_markup::{Document, NodeId, SerializeFilter};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::{ConflictPolicy, HostConfig};
use crate::error::{BlockReason, SurfaceError, SyncError};
use crate::surface::Surface;
use crate::widgets::TRANSIENT_CLASSES;

pub const HIGHLIGHT_CLASS: &str = "search-highlight";

/// Strips live-only state at commit time: search highlight marks are
/// unwrapped and selection or playback classes are dropped.
pub struct TransientFilter;

impl SerializeFilter for TransientFilter {
    fn unwrap(&self, doc: &Document, id: NodeId) -> bool {
        doc.is_element(id, "mark") && doc.has_class(id, HIGHLIGHT_CLASS)
    }

    fn drop_class(&self, class: &str) -> bool {
        TRANSIENT_CLASSES.contains(&class)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Delivered to the change callback right away.
    Emitted(String),
    /// Large document: delivery waits for the debounce deadline.
    Scheduled(String),
    Unchanged,
    /// IME composition in progress; committed when it ends.
    Deferred,
}

impl CommitOutcome {
    pub fn snapshot(&self) -> Option<&str> {
        match self {
            CommitOutcome::Emitted(s) | CommitOutcome::Scheduled(s) => Some(s),
            CommitOutcome::Unchanged | CommitOutcome::Deferred => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Applied,
    Unchanged,
    Dropped(BlockReason),
    Deferred(BlockReason),
}

#[derive(Debug)]
struct PendingCommit {
    content: String,
    due: Instant,
}

#[derive(Debug)]
struct HeldUpdate {
    content: String,
    edits_at_arrival: u64,
}

/// Binds the live surface to the caller's serialized content: extracts and
/// delivers local edits, and decides when external content may replace the
/// surface.
pub struct ContentHost {
    surface: Surface,
    config: HostConfig,
    last_committed: String,
    /// Local commits so far, counted when emitted or scheduled.
    local_edits: u64,
    pending: Option<PendingCommit>,
    held: Option<HeldUpdate>,
    on_change: Box<dyn FnMut(&str)>,
    clock: Box<dyn Clock>,
}

impl ContentHost {
    pub fn new(
        initial: &str,
        config: HostConfig,
        on_change: Box<dyn FnMut(&str)>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let surface = Surface::from_markup(initial);
        let mut host = Self {
            surface,
            config,
            last_committed: String::new(),
            local_edits: 0,
            pending: None,
            held: None,
            on_change,
            clock,
        };
        host.last_committed = host.extract();
        host
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn set_config(&mut self, config: HostConfig) {
        self.config = config;
    }

    pub fn last_committed(&self) -> &str {
        &self.last_committed
    }

    pub fn has_pending_commit(&self) -> bool {
        self.pending.is_some()
    }

    pub fn held_update(&self) -> Option<&str> {
        self.held.as_ref().map(|h| h.content.as_str())
    }

    /// Serialized surface content with transient state stripped.
    pub fn extract(&self) -> String {
        let doc = self.surface.doc();
        doc.inner_html_filtered(doc.root(), &TransientFilter)
    }

    fn is_large(&self, content: &str) -> bool {
        content.chars().count() > self.config.large_content_chars
    }

    fn deliver(&mut self, content: String) {
        (self.on_change)(&content);
        self.last_committed = content;
    }

    pub fn commit(&mut self) -> CommitOutcome {
        if self.surface.is_composing() {
            debug!("commit deferred until composition ends");
            return CommitOutcome::Deferred;
        }
        let content = self.extract();
        if content == self.last_committed {
            if self.pending.take().is_some() {
                debug!("pending commit superseded by unchanged content");
            }
            return CommitOutcome::Unchanged;
        }
        self.local_edits += 1;
        if self.is_large(&content) {
            let due = self.clock.now() + self.config.debounce;
            debug!(chars = content.len(), "commit debounced");
            self.pending = Some(PendingCommit {
                content: content.clone(),
                due,
            });
            return CommitOutcome::Scheduled(content);
        }
        self.pending = None;
        self.deliver(content.clone());
        CommitOutcome::Emitted(content)
    }

    /// Delivers a debounced commit whose deadline has passed.
    pub fn flush_due(&mut self) -> Option<String> {
        let now = self.clock.now();
        if self.pending.as_ref().is_some_and(|p| p.due <= now) {
            return self.flush();
        }
        None
    }

    pub fn flush(&mut self) -> Option<String> {
        let pending = self.pending.take()?;
        self.deliver(pending.content.clone());
        Some(pending.content)
    }

    fn block_reason(&self) -> Option<BlockReason> {
        if self.surface.is_composing() {
            Some(BlockReason::Composing)
        } else if self.surface.is_focused() {
            Some(BlockReason::Focused)
        } else if self.has_highlights() {
            Some(BlockReason::TransientOverlay)
        } else {
            None
        }
    }

    /// Offers external content to the surface. Content equal to the last
    /// commit never touches the surface.
    pub fn render_external(&mut self, content: &str) -> Result<RenderOutcome, SyncError> {
        if content == self.last_committed || content == self.extract() {
            return Ok(RenderOutcome::Unchanged);
        }
        let Some(reason) = self.block_reason() else {
            self.apply(content);
            return Ok(RenderOutcome::Applied);
        };
        match self.config.conflict_policy {
            ConflictPolicy::Drop => {
                warn!(%reason, "external update dropped");
                Ok(RenderOutcome::Dropped(reason))
            }
            ConflictPolicy::DeferUntilBlur => {
                debug!(%reason, "external update held");
                self.held = Some(HeldUpdate {
                    content: content.to_string(),
                    edits_at_arrival: self.local_edits,
                });
                Ok(RenderOutcome::Deferred(reason))
            }
            ConflictPolicy::Reject => Err(SyncError::Conflict { reason }),
        }
    }

    fn apply(&mut self, content: &str) {
        if self.pending.take().is_some() {
            warn!("pending local commit superseded by external content");
        }
        self.held = None;
        self.surface.replace_content(content);
        self.last_committed = self.extract();
    }

    /// Re-renders a snapshot from the local history. Runs regardless of
    /// focus and notifies the caller.
    pub fn restore(&mut self, snapshot: &str) -> CommitOutcome {
        self.surface.replace_content(snapshot);
        self.pending = None;
        let content = self.extract();
        if content == self.last_committed {
            return CommitOutcome::Unchanged;
        }
        self.local_edits += 1;
        self.deliver(content.clone());
        CommitOutcome::Emitted(content)
    }

    pub fn focus(&mut self) {
        self.surface.focus();
    }

    /// Blurs the surface and applies a held external update if nothing was
    /// committed or scheduled locally since it arrived.
    pub fn blur(&mut self) -> RenderOutcome {
        self.surface.blur();
        self.apply_held()
    }

    fn apply_held(&mut self) -> RenderOutcome {
        if self.block_reason().is_some() {
            return RenderOutcome::Unchanged;
        }
        let Some(held) = self.held.take() else {
            return RenderOutcome::Unchanged;
        };
        if self.local_edits > held.edits_at_arrival {
            warn!("held external update discarded: local edits are newer");
            return RenderOutcome::Unchanged;
        }
        if held.content == self.last_committed {
            return RenderOutcome::Unchanged;
        }
        self.apply(&held.content);
        RenderOutcome::Applied
    }

    pub fn composition_start(&mut self) {
        self.surface.set_composing(true);
    }

    pub fn composition_end(&mut self) -> CommitOutcome {
        self.surface.set_composing(false);
        self.commit()
    }

    pub fn has_highlights(&self) -> bool {
        let doc = self.surface.doc();
        !doc.find_by_class(doc.root(), HIGHLIGHT_CLASS).is_empty()
    }

    /// Wraps every ASCII-case-insensitive occurrence of `query` in a search
    /// highlight mark. Returns the number of matches.
    pub fn highlight(&mut self, query: &str) -> Result<usize, SurfaceError> {
        self.clear_highlights()?;
        if query.is_empty() {
            return Ok(0);
        }
        let needle = query.to_ascii_lowercase();
        let doc = self.surface.doc_mut();
        let root = doc.root();
        let mut count = 0;
        for text in doc.text_nodes_in(root) {
            let in_widget = doc
                .closest(text, |d, n| d.attr(n, crate::widgets::WIDGET_ATTR).is_some())
                .is_some();
            if in_widget {
                continue;
            }
            let haystack = doc.text(text).unwrap_or_default().to_ascii_lowercase();
            let starts: Vec<usize> = haystack.match_indices(&needle).map(|(ix, _)| ix).collect();
            for &start in starts.iter().rev() {
                let end = start + needle.len();
                if end < doc.text(text).map_or(0, str::len) {
                    doc.split_text(text, end)?;
                }
                let hit = if start > 0 {
                    doc.split_text(text, start)?
                } else {
                    text
                };
                let mark = doc.create_element("mark");
                doc.set_attr(mark, "class", HIGHLIGHT_CLASS)?;
                doc.wrap(hit, mark)?;
            }
            count += starts.len();
        }
        Ok(count)
    }

    /// Removes search highlights. A held external update may apply now.
    pub fn clear_highlights(&mut self) -> Result<RenderOutcome, SurfaceError> {
        let doc = self.surface.doc_mut();
        let root = doc.root();
        for mark in doc.find_by_class(root, HIGHLIGHT_CLASS) {
            doc.unwrap(mark)?;
        }
        Ok(self.apply_held())
    }
}
