use crate::node::{Document, NodeData, NodeId};

/// Hooks applied while serializing. Nothing here mutates the tree, so the
/// live surface keeps its transient state while the output omits it.
pub trait SerializeFilter {
    /// Emit only the children of this element.
    fn unwrap(&self, _doc: &Document, _id: NodeId) -> bool {
        false
    }

    /// Drop this class from the emitted `class` attribute.
    fn drop_class(&self, _class: &str) -> bool {
        false
    }
}

pub struct NoFilter;

impl SerializeFilter for NoFilter {}

impl Document {
    pub fn inner_html(&self, id: NodeId) -> String {
        self.inner_html_filtered(id, &NoFilter)
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &NoFilter, &mut out);
        out
    }

    pub fn inner_html_filtered(&self, id: NodeId, filter: &dyn SerializeFilter) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, filter, &mut out);
        }
        out
    }

    /// Serialized markup of everything under the root.
    pub fn to_markup(&self) -> String {
        self.inner_html(self.root())
    }

    fn write_node(&self, id: NodeId, filter: &dyn SerializeFilter, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match node.data() {
            NodeData::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag(p))
                    .is_some_and(|tag| matches!(tag, "script" | "style"));
                if raw {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element(el) => {
                if filter.unwrap(self, id) {
                    for &child in self.children(id) {
                        self.write_node(child, filter, out);
                    }
                    return;
                }

                out.push('<');
                out.push_str(&el.tag);
                for attr in &el.attrs {
                    let value = if attr.name == "class" {
                        let kept = attr
                            .value
                            .split_ascii_whitespace()
                            .filter(|c| !filter.drop_class(c))
                            .collect::<Vec<_>>()
                            .join(" ");
                        if kept.is_empty() && !attr.value.trim().is_empty() {
                            continue;
                        }
                        if kept.split_ascii_whitespace().eq(attr.value.split_ascii_whitespace()) {
                            attr.value.clone()
                        } else {
                            kept
                        }
                    } else {
                        attr.value.clone()
                    };
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    escape_attr(&value, out);
                    out.push('"');
                }
                out.push('>');

                if el.is_void() {
                    return;
                }
                for &child in self.children(id) {
                    self.write_node(child, filter, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
