use crate::MarkupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<Attr>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attrs.push(Attr {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let ix = self.attrs.iter().position(|a| a.name == name)?;
        Some(self.attrs.remove(ix).value)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn is_void(&self) -> bool {
        is_void_tag(&self.tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
    Comment(String),
}

/// Old-to-new id table produced by [`Document::compact`].
#[derive(Debug, Clone, Default)]
pub struct Remap(Vec<Option<NodeId>>);

impl Remap {
    /// The id `old` now has, or `None` when the node was freed.
    pub fn get(&self, old: NodeId) -> Option<NodeId> {
        self.0.get(old.0).copied().flatten()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
    pub(crate) bound: bool,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
            bound: false,
        }
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

const BLOCK_TAGS: &[&str] = &[
    "p",
    "div",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blockquote",
    "pre",
    "ul",
    "ol",
    "li",
    "table",
    "thead",
    "tbody",
    "tr",
    "td",
    "th",
    "hr",
    "figure",
];

pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// Arena-backed markup tree. Every node lives in `nodes`; detached nodes stay
/// allocated until [`Document::compact`] runs or the document is dropped.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Element(Element::new("div")))],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[self.root.0].children.is_empty()
    }

    /// Nodes reachable from the root, root included.
    pub fn attached_len(&self) -> usize {
        self.descendants(self.root).len()
    }

    /// Frees every node that is not reachable from the root and renumbers
    /// the rest in document order. Ids held from before must go through the
    /// returned [`Remap`].
    pub fn compact(&mut self) -> Remap {
        let order = self.descendants(self.root);
        let mut map = vec![None; self.nodes.len()];
        for (new, &old) in order.iter().enumerate() {
            map[old.0] = Some(NodeId(new));
        }
        let mut old_nodes: Vec<Option<Node>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(order.len());
        for old in order {
            let Some(mut node) = old_nodes[old.0].take() else {
                continue;
            };
            node.parent = node.parent.and_then(|p| map[p.0]);
            node.children = node.children.iter().filter_map(|c| map[c.0]).collect();
            nodes.push(node);
        }
        self.nodes = nodes;
        self.root = NodeId(0);
        Remap(map)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn get(&self, id: NodeId) -> Result<&Node, MarkupError> {
        self.nodes.get(id.0).ok_or(MarkupError::UnknownNode(id.0))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, MarkupError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(MarkupError::UnknownNode(id.0))
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node::new(data));
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(Element::new(tag)))
    }

    pub fn create_element_with(&mut self, element: Element) -> NodeId {
        self.alloc(NodeData::Element(element))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let ix = self.index_in_parent(id)?;
        self.children(parent).get(ix + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let ix = self.index_in_parent(id)?;
        ix.checked_sub(1)
            .and_then(|ix| self.children(parent).get(ix).copied())
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.data) {
            Some(NodeData::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn is_element(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), MarkupError> {
        match &mut self.get_mut(id)?.data {
            NodeData::Text(current) => {
                *current = text.into();
                Ok(())
            }
            _ => Err(MarkupError::NotText(id.0)),
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn set_attr(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), MarkupError> {
        self.element_mut(id)
            .ok_or(MarkupError::NotElement(id.0))?
            .set_attr(name, value);
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id).and_then(|el| el.remove_attr(name))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<(), MarkupError> {
        if self.has_class(id, class) {
            return Ok(());
        }
        let el = self.element_mut(id).ok_or(MarkupError::NotElement(id.0))?;
        let next = match el.attr("class").map(str::trim).filter(|c| !c.is_empty()) {
            Some(existing) => format!("{existing} {class}"),
            None => class.to_string(),
        };
        el.set_attr("class", next);
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<(), MarkupError> {
        if !self.has_class(id, class) {
            return Ok(());
        }
        let el = self.element_mut(id).ok_or(MarkupError::NotElement(id.0))?;
        let next = el
            .classes()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        if next.is_empty() {
            el.remove_attr("class");
        } else {
            el.set_attr("class", next);
        }
        Ok(())
    }

    /// Returns the new state of the class.
    pub fn toggle_class(&mut self, id: NodeId, class: &str) -> Result<bool, MarkupError> {
        if self.has_class(id, class) {
            self.remove_class(id, class)?;
            Ok(false)
        } else {
            self.add_class(id, class)?;
            Ok(true)
        }
    }

    pub fn is_bound(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.bound)
    }

    pub fn set_bound(&mut self, id: NodeId, bound: bool) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.bound = bound;
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    pub fn detach(&mut self, id: NodeId) -> Result<(), MarkupError> {
        let Some(parent) = self.get(id)?.parent else {
            return Ok(());
        };
        self.get_mut(parent)?.children.retain(|&c| c != id);
        self.get_mut(id)?.parent = None;
        Ok(())
    }

    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), MarkupError> {
        if matches!(self.get(parent)?.data, NodeData::Text(_) | NodeData::Comment(_)) {
            return Err(MarkupError::NotElement(parent.0));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(MarkupError::Cycle(child.0));
        }
        self.detach(child)?;
        let children = &mut self.get_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), MarkupError> {
        self.insert_child(parent, usize::MAX, child)
    }

    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<(), MarkupError> {
        let parent = self
            .parent(reference)
            .ok_or(MarkupError::Detached(reference.0))?;
        self.detach(node)?;
        let ix = self
            .index_in_parent(reference)
            .ok_or(MarkupError::Detached(reference.0))?;
        self.insert_child(parent, ix, node)
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> Result<(), MarkupError> {
        let parent = self
            .parent(reference)
            .ok_or(MarkupError::Detached(reference.0))?;
        self.detach(node)?;
        let ix = self
            .index_in_parent(reference)
            .ok_or(MarkupError::Detached(reference.0))?;
        self.insert_child(parent, ix + 1, node)
    }

    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), MarkupError> {
        self.insert_before(old, new)?;
        self.detach(old)
    }

    pub fn clear_children(&mut self, id: NodeId) -> Result<(), MarkupError> {
        let children = std::mem::take(&mut self.get_mut(id)?.children);
        for child in children {
            self.get_mut(child)?.parent = None;
        }
        Ok(())
    }

    /// Shallow copy of an element (tag and attributes, no children).
    pub fn clone_shallow(&mut self, id: NodeId) -> Result<NodeId, MarkupError> {
        let data = self.get(id)?.data.clone();
        Ok(self.alloc(data))
    }

    pub fn clone_deep(&mut self, id: NodeId) -> Result<NodeId, MarkupError> {
        let copy = self.clone_shallow(id)?;
        for child in self.children(id).to_vec() {
            let child_copy = self.clone_deep(child)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// Nearest inclusive ancestor matching `pred`.
    pub fn closest(&self, id: NodeId, pred: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        if pred(self, id) {
            return Some(id);
        }
        self.ancestors(id).find(|&a| pred(self, a))
    }

    pub fn closest_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.closest(id, |doc, n| doc.is_element(n, tag))
    }

    pub fn closest_class(&self, id: NodeId, class: &str) -> Option<NodeId> {
        self.closest(id, |doc, n| doc.has_class(n, class))
    }

    /// Pre-order walk of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            for &child in self.children(node).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    pub fn find_all(&self, within: NodeId, pred: impl Fn(&Document, NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(within)
            .into_iter()
            .filter(|&n| pred(self, n))
            .collect()
    }

    pub fn find_by_class(&self, within: NodeId, class: &str) -> Vec<NodeId> {
        self.find_all(within, |doc, n| doc.has_class(n, class))
    }

    pub fn find_first(&self, within: NodeId, pred: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(within).into_iter().find(|&n| pred(self, n))
    }

    pub fn text_nodes_in(&self, id: NodeId) -> Vec<NodeId> {
        self.find_all(id, |doc, n| doc.is_text(n))
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.text_nodes_in(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Next node in document order after `id`, not descending into `id`.
    pub fn next_in_order_skipping(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if let Some(next) = self.next_sibling(current) {
                return Some(next);
            }
            current = self.parent(current)?;
        }
    }

    pub fn next_in_order(&self, id: NodeId) -> Option<NodeId> {
        self.first_child(id)
            .or_else(|| self.next_in_order_skipping(id))
    }

    /// Whether `a` comes strictly before `b` in document order.
    pub fn precedes(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let path_a = self.path_from_root(a);
        let path_b = self.path_from_root(b);
        for (x, y) in path_a.iter().zip(path_b.iter()) {
            if x != y {
                return x < y;
            }
        }
        path_a.len() < path_b.len()
    }

    /// Child indices from the root down to `id`.
    pub fn path_from_root(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(ix) = self.index_in_parent(current) {
            path.push(ix);
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}
