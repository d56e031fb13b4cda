use note_markup::{Document, NodeId, css_number};
use serde::Serialize;

use crate::surface::{InlineStyle, Surface};
use crate::widgets::ITEM_CLASS;

/// Formatting active at the caret (or selection start), as the toolbar
/// shows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolbarState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub link: bool,
    pub blockquote: bool,
    pub bulleted_list: bool,
    pub checklist: bool,
    pub in_table: bool,
    /// Tag of the nearest text block, e.g. `p` or `h2`.
    pub block: Option<String>,
    pub font_size: Option<f64>,
    pub align: Option<String>,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl ToolbarState {
    pub fn compute(surface: &Surface) -> Self {
        let Some(node) = anchor_node(surface) else {
            return Self::default();
        };
        let doc = surface.doc();
        let root = surface.root();
        let lineage: Vec<NodeId> = std::iter::once(node)
            .chain(doc.ancestors(node))
            .take_while(|&n| n != root)
            .collect();
        let has_tag = |pred: &dyn Fn(&str) -> bool| {
            lineage.iter().any(|&n| doc.tag(n).is_some_and(pred))
        };
        let styled = |style: InlineStyle| has_tag(&|t: &str| style.matches_tag(t));

        Self {
            bold: styled(InlineStyle::Bold),
            italic: styled(InlineStyle::Italic),
            underline: styled(InlineStyle::Underline),
            strikethrough: styled(InlineStyle::Strikethrough),
            code: styled(InlineStyle::Code),
            link: has_tag(&|t: &str| t == "a"),
            blockquote: has_tag(&|t: &str| t == "blockquote"),
            bulleted_list: lineage
                .iter()
                .any(|&n| doc.is_element(n, "ul") && !doc.has_class(n, "checklist")),
            checklist: lineage.iter().any(|&n| doc.has_class(n, ITEM_CLASS)),
            in_table: has_tag(&|t: &str| matches!(t, "td" | "th")),
            block: surface
                .block_of(node)
                .and_then(|b| doc.tag(b))
                .map(str::to_string),
            font_size: inherited_style(doc, &lineage, "font-size").and_then(|v| css_number(&v)),
            align: inherited_style(doc, &lineage, "text-align"),
            can_undo: false,
            can_redo: false,
        }
    }
}

fn anchor_node(surface: &Surface) -> Option<NodeId> {
    let selection = surface.selection()?;
    match surface.ordered_range() {
        Some((start, _)) => Some(start.node),
        None => surface
            .doc()
            .is_attached(selection.focus.node)
            .then_some(selection.focus.node),
    }
}

fn inherited_style(doc: &Document, lineage: &[NodeId], prop: &str) -> Option<String> {
    lineage.iter().find_map(|&n| doc.style_property(n, prop))
}
