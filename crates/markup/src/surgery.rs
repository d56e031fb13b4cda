use crate::node::{Document, NodeId};
use crate::MarkupError;

impl Document {
    /// Splits a text node at byte `offset` (clamped to a char boundary) and
    /// returns the new node holding the tail, inserted right after `id`.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, MarkupError> {
        let text = self.text(id).ok_or(MarkupError::NotText(id.0))?.to_string();
        let offset = clamp_to_char_boundary(&text, offset);
        let (head, tail) = text.split_at(offset);
        let tail_node = self.create_text(tail);
        self.set_text(id, head)?;
        if self.parent(id).is_some() {
            self.insert_after(id, tail_node)?;
        }
        Ok(tail_node)
    }

    /// Puts `wrapper` where `id` was and moves `id` inside it.
    pub fn wrap(&mut self, id: NodeId, wrapper: NodeId) -> Result<(), MarkupError> {
        self.insert_before(id, wrapper)?;
        self.append_child(wrapper, id)
    }

    /// Wraps a run of siblings (in order) with `wrapper`.
    pub fn wrap_all(&mut self, nodes: &[NodeId], wrapper: NodeId) -> Result<(), MarkupError> {
        let Some(&first) = nodes.first() else {
            return Ok(());
        };
        self.insert_before(first, wrapper)?;
        for &node in nodes {
            self.append_child(wrapper, node)?;
        }
        Ok(())
    }

    /// Replaces an element with its children. Returns the moved children.
    pub fn unwrap(&mut self, id: NodeId) -> Result<Vec<NodeId>, MarkupError> {
        if self.parent(id).is_none() {
            return Err(MarkupError::Detached(id.0));
        }
        let children = self.children(id).to_vec();
        for &child in &children {
            self.insert_before(id, child)?;
        }
        self.detach(id)?;
        Ok(children)
    }

    /// Moves every child of `el` after `child` into a shallow copy of `el`
    /// placed right after it. Returns the copy, if anything was moved.
    pub fn split_element_after(
        &mut self,
        el: NodeId,
        child: NodeId,
    ) -> Result<Option<NodeId>, MarkupError> {
        let ix = self
            .children(el)
            .iter()
            .position(|&c| c == child)
            .ok_or(MarkupError::NotAChild(child.0))?;
        let moved = self.children(el)[ix + 1..].to_vec();
        if moved.is_empty() {
            return Ok(None);
        }
        let copy = self.clone_shallow(el)?;
        self.insert_after(el, copy)?;
        for node in moved {
            self.append_child(copy, node)?;
        }
        Ok(Some(copy))
    }

    /// Moves every child of `el` before `child` into a shallow copy of `el`
    /// placed right before it. Returns the copy, if anything was moved.
    pub fn split_element_before(
        &mut self,
        el: NodeId,
        child: NodeId,
    ) -> Result<Option<NodeId>, MarkupError> {
        let ix = self
            .children(el)
            .iter()
            .position(|&c| c == child)
            .ok_or(MarkupError::NotAChild(child.0))?;
        let moved = self.children(el)[..ix].to_vec();
        if moved.is_empty() {
            return Ok(None);
        }
        let copy = self.clone_shallow(el)?;
        self.insert_before(el, copy)?;
        for node in moved {
            self.append_child(copy, node)?;
        }
        Ok(Some(copy))
    }

    /// Splits every level between `node` and `ancestor` so that `ancestor`
    /// ends up containing only the branch leading to `node`. Siblings on
    /// either side are moved into shallow copies.
    pub fn isolate(&mut self, node: NodeId, ancestor: NodeId) -> Result<(), MarkupError> {
        let mut child = node;
        loop {
            let parent = self.parent(child).ok_or(MarkupError::Detached(child.0))?;
            self.split_element_after(parent, child)?;
            self.split_element_before(parent, child)?;
            if parent == ancestor {
                return Ok(());
            }
            child = parent;
        }
    }

    /// Removes inline elements left without any children, walking upward
    /// from `start` until `stop`.
    pub fn prune_empty(&mut self, start: NodeId, stop: NodeId) -> Result<(), MarkupError> {
        let mut current = Some(start);
        while let Some(node) = current {
            if node == stop {
                break;
            }
            let parent = self.parent(node);
            let empty_element = self
                .element(node)
                .is_some_and(|el| !el.is_void() && self.children(node).is_empty());
            let empty_text = self.text(node).is_some_and(str::is_empty);
            if empty_element || empty_text {
                self.detach(node)?;
                current = parent;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Joins adjacent text siblings under `id` (recursively).
    pub fn normalize_text(&mut self, id: NodeId) -> Result<(), MarkupError> {
        let children = self.children(id).to_vec();
        let mut previous_text: Option<NodeId> = None;
        for child in children {
            if let Some(text) = self.text(child).map(str::to_string) {
                if text.is_empty() {
                    self.detach(child)?;
                    continue;
                }
                if let Some(prev) = previous_text {
                    let merged = format!("{}{}", self.text(prev).unwrap_or(""), text);
                    self.set_text(prev, merged)?;
                    self.detach(child)?;
                    continue;
                }
                previous_text = Some(child);
            } else {
                previous_text = None;
                self.normalize_text(child)?;
            }
        }
        Ok(())
    }
}

pub fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}
