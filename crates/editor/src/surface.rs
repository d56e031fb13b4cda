use note_markup::{Document, NodeId, Remap, clamp_to_char_boundary, is_block_tag};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SurfaceError;
use crate::widgets::WIDGET_ATTR;

/// Version of the primitive operation set below. Bumped whenever an
/// operation changes meaning.
pub const PRIMITIVES_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    pub fn collapsed(position: Position) -> Self {
        Self {
            anchor: position,
            focus: position,
        }
    }

    pub fn caret(node: NodeId, offset: usize) -> Self {
        Self::collapsed(Position::new(node, offset))
    }

    pub fn range(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineStyle {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl InlineStyle {
    pub fn tag(self) -> &'static str {
        match self {
            InlineStyle::Bold => "b",
            InlineStyle::Italic => "i",
            InlineStyle::Underline => "u",
            InlineStyle::Strikethrough => "s",
            InlineStyle::Code => "code",
        }
    }

    pub fn matches_tag(self, tag: &str) -> bool {
        match self {
            InlineStyle::Bold => matches!(tag, "b" | "strong"),
            InlineStyle::Italic => matches!(tag, "i" | "em"),
            InlineStyle::Underline => tag == "u",
            InlineStyle::Strikethrough => matches!(tag, "s" | "strike" | "del"),
            InlineStyle::Code => tag == "code",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Paragraph,
    Heading(u8),
    Preformatted,
}

impl BlockType {
    pub fn tag(self) -> String {
        match self {
            BlockType::Paragraph => "p".to_string(),
            BlockType::Heading(level) => format!("h{}", level.clamp(1, 6)),
            BlockType::Preformatted => "pre".to_string(),
        }
    }
}

/// The swappable seam between structured commands and the concrete
/// editing surface.
pub trait EditingPrimitives {
    fn primitives_version(&self) -> u32 {
        PRIMITIVES_VERSION
    }

    /// Returns whether the style is active on the selection afterwards.
    fn toggle_style(&mut self, style: InlineStyle) -> Result<bool, SurfaceError>;

    fn set_block_type(&mut self, block: BlockType) -> Result<(), SurfaceError>;

    fn insert_node_at_selection(&mut self, node: NodeId) -> Result<(), SurfaceError>;

    /// Wraps the selected text runs. Returns every wrapper placed.
    fn wrap_selection(&mut self, wrapper: NodeId) -> Result<Vec<NodeId>, SurfaceError>;
}

const RETAGGABLE: &[&str] = &["p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "pre"];

/// The live editing surface: a markup tree plus focus, composition and
/// selection state.
#[derive(Debug)]
pub struct Surface {
    doc: Document,
    focused: bool,
    composing: bool,
    selection: Option<Selection>,
}

impl Surface {
    pub fn from_markup(markup: &str) -> Self {
        Self {
            doc: Document::parse(markup),
            focused: false,
            composing: false,
            selection: None,
        }
    }

    /// Wholesale re-render. Every node id from before is invalid afterwards.
    pub fn replace_content(&mut self, markup: &str) {
        self.doc = Document::parse(markup);
        self.selection = None;
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn root(&self) -> NodeId {
        self.doc.root()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    /// Keeps the selection so it is still there when focus comes back.
    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn set_composing(&mut self, composing: bool) {
        self.composing = composing;
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), SurfaceError> {
        if !self.doc.is_attached(selection.anchor.node) || !self.doc.is_attached(selection.focus.node)
        {
            return Err(SurfaceError::DetachedSelection);
        }
        self.selection = Some(selection);
        Ok(())
    }

    /// Frees detached nodes. The selection follows its nodes, or is
    /// dropped when one of them was freed.
    pub fn compact(&mut self) -> Remap {
        let remap = self.doc.compact();
        self.selection = self.selection.and_then(|sel| {
            let anchor = Position::new(remap.get(sel.anchor.node)?, sel.anchor.offset);
            let focus = Position::new(remap.get(sel.focus.node)?, sel.focus.offset);
            Some(Selection::range(anchor, focus))
        });
        remap
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Places the caret at the end of the last text in the document.
    pub fn select_end(&mut self) {
        let root = self.root();
        self.selection = self
            .doc
            .text_nodes_in(root)
            .last()
            .map(|&t| Selection::caret(t, self.doc.text(t).map(str::len).unwrap_or(0)));
    }

    pub fn markup(&self) -> String {
        self.doc.to_markup()
    }

    /// Nearest block-level ancestor (or self) below the root.
    pub fn block_of(&self, node: NodeId) -> Option<NodeId> {
        let root = self.root();
        std::iter::once(node)
            .chain(self.doc.ancestors(node))
            .take_while(|&n| n != root)
            .find(|&n| self.doc.tag(n).is_some_and(is_block_tag))
    }

    /// Ancestor (or self) whose parent is the root.
    pub fn top_level_of(&self, node: NodeId) -> Option<NodeId> {
        let root = self.root();
        std::iter::once(node)
            .chain(self.doc.ancestors(node))
            .find(|&n| self.doc.parent(n) == Some(root))
    }

    pub fn is_widget(&self, node: NodeId) -> bool {
        self.doc.attr(node, WIDGET_ATTR).is_some()
    }

    fn resolve_text_position(&self, position: Position) -> Option<Position> {
        let doc = &self.doc;
        if !doc.is_attached(position.node) {
            return None;
        }
        if let Some(text) = doc.text(position.node) {
            return Some(Position::new(
                position.node,
                clamp_to_char_boundary(text, position.offset),
            ));
        }
        let children = doc.children(position.node);
        if let Some(&child) = children.get(position.offset)
            && let Some(&first) = doc.text_nodes_in(child).first()
        {
            return Some(Position::new(first, 0));
        }
        let before = &children[..position.offset.min(children.len())];
        before.iter().rev().find_map(|&child| {
            doc.text_nodes_in(child)
                .last()
                .map(|&t| Position::new(t, doc.text(t).map(str::len).unwrap_or(0)))
        })
    }

    /// Caret resolved onto a text node, creating one when the caret sits in an
    /// element without text. Collapses the selection onto that caret.
    pub fn caret_text_position(&mut self) -> Result<Position, SurfaceError> {
        let focus = self.selection.map(|s| s.focus);
        if let Some(position) = focus.and_then(|p| self.resolve_text_position(p)) {
            return Ok(position);
        }

        let root = self.root();
        let text = self.doc.create_text("");
        match focus.filter(|p| self.doc.is_attached(p.node)) {
            Some(position) => {
                self.doc.insert_child(position.node, position.offset, text)?;
            }
            None => {
                let paragraph = self.doc.create_element("p");
                self.doc.append_child(paragraph, text)?;
                self.doc.append_child(root, paragraph)?;
            }
        }
        let position = Position::new(text, 0);
        self.selection = Some(Selection::collapsed(position));
        Ok(position)
    }

    /// Selection endpoints in document order, both resolved onto text nodes.
    pub fn ordered_range(&self) -> Option<(Position, Position)> {
        let selection = self.selection?;
        let anchor = self.resolve_text_position(selection.anchor)?;
        let focus = self.resolve_text_position(selection.focus)?;
        let anchor_first = if anchor.node == focus.node {
            anchor.offset <= focus.offset
        } else {
            self.doc.precedes(anchor.node, focus.node)
        };
        Some(if anchor_first {
            (anchor, focus)
        } else {
            (focus, anchor)
        })
    }

    /// Splits text at both selection ends and returns every non-empty text
    /// node fully covered, in document order. The selection is rewritten to
    /// span exactly those nodes.
    pub fn split_selection(&mut self) -> Result<Vec<NodeId>, SurfaceError> {
        let Some((start, end)) = self.ordered_range() else {
            return Ok(Vec::new());
        };
        if start == end {
            return Ok(Vec::new());
        }

        let first;
        let last;
        if start.node == end.node {
            let len = self.doc.text(end.node).map(str::len).unwrap_or(0);
            if end.offset < len {
                self.doc.split_text(end.node, end.offset)?;
            }
            first = if start.offset > 0 {
                self.doc.split_text(start.node, start.offset)?
            } else {
                start.node
            };
            last = first;
        } else {
            let len = self.doc.text(end.node).map(str::len).unwrap_or(0);
            if end.offset < len {
                self.doc.split_text(end.node, end.offset)?;
            }
            last = end.node;
            first = if start.offset > 0 {
                self.doc.split_text(start.node, start.offset)?
            } else {
                start.node
            };
        }

        let mut texts = Vec::new();
        let mut cursor = Some(first);
        while let Some(node) = cursor {
            if self.doc.text(node).is_some_and(|t| !t.is_empty()) {
                texts.push(node);
            }
            if node == last {
                break;
            }
            cursor = self.doc.next_in_order(node);
        }

        if let (Some(&a), Some(&b)) = (texts.first(), texts.last()) {
            let end_offset = self.doc.text(b).map(str::len).unwrap_or(0);
            self.selection = Some(Selection::range(
                Position::new(a, 0),
                Position::new(b, end_offset),
            ));
        }
        Ok(texts)
    }

    /// Blocks touched by the selection (or the caret), in document order.
    pub fn selected_blocks(&mut self) -> Result<Vec<NodeId>, SurfaceError> {
        let texts = match self.selection {
            Some(sel) if !sel.is_collapsed() => {
                let (start, end) = self.ordered_range().ok_or(SurfaceError::EmptySelection)?;
                let mut nodes = vec![start.node];
                let mut cursor = self.doc.next_in_order(start.node);
                while let Some(node) = cursor {
                    if self.doc.is_text(node) {
                        nodes.push(node);
                    }
                    if node == end.node {
                        break;
                    }
                    cursor = self.doc.next_in_order(node);
                }
                nodes
            }
            _ => vec![self.caret_text_position()?.node],
        };

        let mut blocks: Vec<NodeId> = Vec::new();
        for text in texts {
            let block = match self.block_of(text) {
                Some(block) => block,
                None => self.wrap_inline_run(text, "p")?,
            };
            if !blocks.contains(&block) {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    /// Wraps the run of inline siblings around `node` (under the root) in a
    /// new block element.
    fn wrap_inline_run(&mut self, node: NodeId, tag: &str) -> Result<NodeId, SurfaceError> {
        let top = self.top_level_of(node).unwrap_or(node);
        let root = self.root();
        let siblings = self.doc.children(root).to_vec();
        let ix = siblings.iter().position(|&n| n == top).unwrap_or(0);
        let is_inline = |doc: &Document, n: NodeId| !doc.tag(n).is_some_and(is_block_tag);

        let mut start = ix;
        while start > 0 && is_inline(&self.doc, siblings[start - 1]) {
            start -= 1;
        }
        let mut end = ix;
        while end + 1 < siblings.len() && is_inline(&self.doc, siblings[end + 1]) {
            end += 1;
        }

        let block = self.doc.create_element(tag);
        self.doc.wrap_all(&siblings[start..=end], block)?;
        Ok(block)
    }

    fn closest_styled(&self, node: NodeId, style: InlineStyle) -> Option<NodeId> {
        let root = self.root();
        self.doc
            .ancestors(node)
            .take_while(|&n| n != root)
            .find(|&n| self.doc.tag(n).is_some_and(|t| style.matches_tag(t)))
    }

    /// Moves everything from `node` onward out of `ancestor` into a shallow
    /// copy placed after it. Returns the copy.
    pub fn split_off(&mut self, node: NodeId, ancestor: NodeId) -> Result<NodeId, SurfaceError> {
        let mut child = node;
        loop {
            let parent = self
                .doc
                .parent(child)
                .ok_or(SurfaceError::DetachedSelection)?;
            let ix = self.doc.index_in_parent(child).unwrap_or(0);
            let moved = self.doc.children(parent)[ix..].to_vec();
            let copy = self.doc.clone_shallow(parent)?;
            self.doc.insert_after(parent, copy)?;
            for n in moved {
                self.doc.append_child(copy, n)?;
            }
            if parent == ancestor {
                return Ok(copy);
            }
            child = copy;
        }
    }

    pub fn delete_selection(&mut self) -> Result<(), SurfaceError> {
        let texts = self.split_selection()?;
        let Some((&first, rest)) = texts.split_first() else {
            return Ok(());
        };
        let root = self.root();
        for &text in rest {
            let parent = self.doc.parent(text);
            self.doc.detach(text)?;
            if let Some(parent) = parent {
                self.doc.prune_empty(parent, root)?;
            }
        }
        self.doc.set_text(first, "")?;
        self.selection = Some(Selection::caret(first, 0));
        Ok(())
    }

    pub fn insert_text(&mut self, text: &str) -> Result<(), SurfaceError> {
        if self.selection.is_some_and(|s| !s.is_collapsed()) {
            self.delete_selection()?;
        }
        let caret = self.caret_text_position()?;
        let mut current = self.doc.text(caret.node).unwrap_or("").to_string();
        let offset = clamp_to_char_boundary(&current, caret.offset);
        current.insert_str(offset, text);
        self.doc.set_text(caret.node, current)?;
        self.selection = Some(Selection::caret(caret.node, offset + text.len()));
        Ok(())
    }

    /// Enter: splits the caret's block in two and moves the caret into the
    /// second half. Returns the new block.
    pub fn insert_paragraph(&mut self) -> Result<NodeId, SurfaceError> {
        if self.selection.is_some_and(|s| !s.is_collapsed()) {
            self.delete_selection()?;
        }
        let caret = self.caret_text_position()?;
        let block = match self.block_of(caret.node) {
            Some(block) => block,
            None => self.wrap_inline_run(caret.node, "p")?,
        };
        let tail = self.doc.split_text(caret.node, caret.offset)?;
        let new_block = self.split_off(tail, block)?;
        if self.doc.text_content(block).is_empty() && self.doc.children(block).len() <= 1 {
            let br = self.doc.create_element("br");
            self.doc.append_child(block, br)?;
        }
        self.selection = Some(Selection::caret(tail, 0));
        Ok(new_block)
    }

    pub fn delete_backward(&mut self) -> Result<(), SurfaceError> {
        if self.selection.is_some_and(|s| !s.is_collapsed()) {
            return self.delete_selection();
        }
        let caret = self.caret_text_position()?;
        if caret.offset > 0 {
            let mut text = self.doc.text(caret.node).unwrap_or("").to_string();
            let start = text[..caret.offset]
                .char_indices()
                .last()
                .map(|(ix, _)| ix)
                .unwrap_or(0);
            text.replace_range(start..caret.offset, "");
            self.doc.set_text(caret.node, text)?;
            self.selection = Some(Selection::caret(caret.node, start));
            return Ok(());
        }

        let block = self.block_of(caret.node);
        let previous_text = self
            .doc
            .text_nodes_in(block.unwrap_or(self.root()))
            .into_iter()
            .take_while(|&t| t != caret.node)
            .filter(|&t| self.doc.text(t).is_some_and(|s| !s.is_empty()))
            .last();
        if let Some(previous) = previous_text {
            let len = self.doc.text(previous).map(str::len).unwrap_or(0);
            self.selection = Some(Selection::caret(previous, len));
            return self.delete_backward();
        }

        let Some(block) = block else {
            return Ok(());
        };
        let Some(previous_block) = self.doc.prev_sibling(block) else {
            return Ok(());
        };
        if self.is_widget(previous_block) || !self.doc.tag(previous_block).is_some_and(is_block_tag)
        {
            debug!("backspace at a widget boundary ignored");
            return Ok(());
        }
        for br in self.doc.find_all(previous_block, |d, n| d.is_element(n, "br")) {
            if self.doc.next_sibling(br).is_none() {
                self.doc.detach(br)?;
            }
        }
        for child in self.doc.children(block).to_vec() {
            self.doc.append_child(previous_block, child)?;
        }
        self.doc.detach(block)?;
        self.selection = Some(Selection::caret(caret.node, 0));
        Ok(())
    }

    fn retag(&mut self, block: NodeId, tag: &str) -> Result<NodeId, SurfaceError> {
        if self.doc.tag(block) == Some(tag) {
            return Ok(block);
        }
        let mut element = self
            .doc
            .element(block)
            .cloned()
            .ok_or(SurfaceError::DetachedSelection)?;
        element.tag = tag.to_string();
        let replacement = self.doc.create_element_with(element);
        for child in self.doc.children(block).to_vec() {
            self.doc.append_child(replacement, child)?;
        }
        self.doc.replace(block, replacement)?;
        self.remap_selection(block, replacement);
        Ok(replacement)
    }

    fn remap_selection(&mut self, from: NodeId, to: NodeId) {
        if let Some(sel) = self.selection.as_mut() {
            for point in [&mut sel.anchor, &mut sel.focus] {
                if point.node == from {
                    point.node = to;
                }
            }
        }
    }
}

impl EditingPrimitives for Surface {
    fn toggle_style(&mut self, style: InlineStyle) -> Result<bool, SurfaceError> {
        let texts = self.split_selection()?;
        if texts.is_empty() {
            debug!(?style, "toggle_style on a collapsed selection is a no-op");
            return Ok(false);
        }

        let all_styled = texts
            .iter()
            .all(|&t| self.closest_styled(t, style).is_some());

        if all_styled {
            for &text in &texts {
                if let Some(styled) = self.closest_styled(text, style) {
                    self.doc.isolate(text, styled)?;
                    self.doc.unwrap(styled)?;
                }
            }
            return Ok(false);
        }

        for &text in &texts {
            if self.closest_styled(text, style).is_some() {
                continue;
            }
            let previous = self.doc.prev_sibling(text);
            match previous {
                Some(prev)
                    if self.doc.tag(prev) == Some(style.tag())
                        && self.doc.element(prev).is_some_and(|el| el.attrs.is_empty()) =>
                {
                    self.doc.append_child(prev, text)?;
                }
                _ => {
                    let wrapper = self.doc.create_element(style.tag());
                    self.doc.wrap(text, wrapper)?;
                }
            }
        }
        Ok(true)
    }

    fn set_block_type(&mut self, block: BlockType) -> Result<(), SurfaceError> {
        let tag = block.tag();
        for current in self.selected_blocks()? {
            let current_tag = self.doc.tag(current).unwrap_or("").to_string();
            if self.is_widget(current) {
                continue;
            }
            if RETAGGABLE.contains(&current_tag.as_str()) {
                self.retag(current, &tag)?;
            } else {
                let inner = self.doc.create_element(&tag);
                let children = self.doc.children(current).to_vec();
                if children.is_empty() {
                    self.doc.append_child(current, inner)?;
                } else {
                    self.doc.wrap_all(&children, inner)?;
                }
            }
        }
        Ok(())
    }

    fn insert_node_at_selection(&mut self, node: NodeId) -> Result<(), SurfaceError> {
        if self.selection.is_some_and(|s| !s.is_collapsed()) {
            self.delete_selection()?;
        }
        let caret = self.caret_text_position()?;
        let is_block = self.doc.tag(node).is_some_and(is_block_tag) || self.is_widget(node);
        let tail = self.doc.split_text(caret.node, caret.offset)?;

        let container = self
            .block_of(caret.node)
            .filter(|&b| RETAGGABLE.contains(&self.doc.tag(b).unwrap_or("")));
        match container {
            Some(block) if is_block => {
                self.split_off(tail, block)?;
                self.doc.insert_after(block, node)?;
                let has_void = self
                    .doc
                    .find_first(block, |d, n| d.element(n).is_some_and(|e| e.is_void()))
                    .is_some();
                if self.doc.text_content(block).is_empty() && !has_void {
                    self.doc.detach(block)?;
                }
            }
            _ => self.doc.insert_after(caret.node, node)?,
        }

        self.selection = Some(Selection::caret(tail, 0));
        Ok(())
    }

    fn wrap_selection(&mut self, wrapper: NodeId) -> Result<Vec<NodeId>, SurfaceError> {
        let texts = self.split_selection()?;
        if texts.is_empty() {
            return Err(SurfaceError::EmptySelection);
        }

        let mut runs: Vec<Vec<NodeId>> = Vec::new();
        for &text in &texts {
            match runs.last_mut() {
                Some(run)
                    if run
                        .last()
                        .is_some_and(|&last| self.doc.next_sibling(last) == Some(text)) =>
                {
                    run.push(text)
                }
                _ => runs.push(vec![text]),
            }
        }

        let mut wrappers = Vec::with_capacity(runs.len());
        for (ix, run) in runs.iter().enumerate() {
            let el = if ix == 0 {
                wrapper
            } else {
                self.doc.clone_shallow(wrapper)?
            };
            self.doc.wrap_all(run, el)?;
            wrappers.push(el);
        }
        Ok(wrappers)
    }
}
