use std::collections::HashMap;
use std::sync::Arc;

use note_markup::{Document, NodeId};
use serde_json::Value;
use tracing::debug;

use crate::error::CommandError;
use crate::surface::{BlockType, EditingPrimitives, InlineStyle, Position, Selection, Surface};
use crate::table::{TableStyle, build_table};
use crate::widgets::{CHECKLIST_CLASS, build_checklist};

pub type CommandHandler =
    Arc<dyn Fn(&mut Surface, Option<Value>) -> Result<(), CommandError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Surface, Option<Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

pub struct CommandRegistry {
    commands: HashMap<String, CommandSpec>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        let mut registry = Self {
            commands: HashMap::new(),
        };
        for spec in builtin_commands() {
            registry.commands.insert(spec.id.clone(), spec);
        }
        registry
    }
}

impl CommandRegistry {
    pub fn register(&mut self, spec: CommandSpec) -> Result<(), String> {
        if self.commands.contains_key(&spec.id) {
            return Err(format!("Duplicate command id: {}", spec.id));
        }
        self.commands.insert(spec.id.clone(), spec);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&CommandSpec> {
        self.commands.get(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn run(&self, surface: &mut Surface, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let spec = self
            .commands
            .get(id)
            .ok_or_else(|| CommandError::Unknown(id.to_string()))?;
        (spec.handler)(surface, args)
    }
}

fn invalid(command: &str, message: impl Into<String>) -> CommandError {
    CommandError::InvalidArgument {
        command: command.to_string(),
        message: message.into(),
    }
}

/// Reads `key` from an object argument, or the argument itself when it is
/// a bare value.
fn arg<'a>(args: &'a Option<Value>, key: &str) -> Option<&'a Value> {
    match args.as_ref()? {
        Value::Object(map) => map.get(key),
        Value::Null => None,
        other => Some(other),
    }
}

fn arg_str<'a>(args: &'a Option<Value>, key: &str) -> Option<&'a str> {
    arg(args, key).and_then(Value::as_str)
}

fn arg_u64(args: &Option<Value>, key: &str) -> Option<u64> {
    arg(args, key).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().trim_end_matches("px").parse().ok()))
    })
}

fn toggle(
    style: InlineStyle,
) -> impl Fn(&mut Surface, Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static {
    move |surface, _args| surface.toggle_style(style).map(|_| ()).map_err(Into::into)
}

fn builtin_commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("bold", "Bold", toggle(InlineStyle::Bold))
            .description("Toggle bold on the selection.")
            .keywords(["bold", "strong"]),
        CommandSpec::new("italic", "Italic", toggle(InlineStyle::Italic))
            .description("Toggle italic on the selection.")
            .keywords(["italic", "emphasis"]),
        CommandSpec::new("underline", "Underline", toggle(InlineStyle::Underline))
            .keywords(["underline"]),
        CommandSpec::new(
            "strikethrough",
            "Strikethrough",
            toggle(InlineStyle::Strikethrough),
        )
        .keywords(["strike", "strikethrough"]),
        CommandSpec::new("code", "Code", toggle(InlineStyle::Code))
            .description("Toggle an inline code span on the selection.")
            .keywords(["code", "monospace"]),
        CommandSpec::new("blockquote", "Quote", |surface, _args| toggle_blockquote(surface))
            .description("Wrap the selected blocks in a block quote, or lift them out of one.")
            .keywords(["quote", "blockquote"]),
        CommandSpec::new("heading", "Heading", |surface, args| {
            let level = arg_u64(&args, "level").unwrap_or(1);
            if !(1..=3).contains(&level) {
                return Err(invalid("heading", format!("level {level} is not in 1..=3")));
            }
            toggle_heading(surface, level as u8)
        })
        .description("Turn the selected blocks into a heading; repeating it reverts to a paragraph.")
        .keywords(["heading", "title", "h1", "h2", "h3"])
        .args_example(serde_json::json!({ "level": 2 })),
        CommandSpec::new("paragraph", "Paragraph", |surface, _args| {
            surface
                .set_block_type(BlockType::Paragraph)
                .map_err(Into::into)
        })
        .keywords(["paragraph", "text"]),
        CommandSpec::new("font_size", "Font size", |surface, args| {
            let size = arg_u64(&args, "size")
                .ok_or_else(|| invalid("font_size", "expected a pixel size"))?;
            if !(8..=72).contains(&size) {
                return Err(invalid("font_size", format!("{size}px is not in 8..=72")));
            }
            wrap_in_span(surface, &format!("font-size: {size}px;"))
        })
        .description("Apply an explicit font size to the selection.")
        .keywords(["font", "size"])
        .args_example(serde_json::json!({ "size": 18 })),
        CommandSpec::new("uppercase", "Uppercase", |surface, _args| {
            convert_case(surface, CaseConversion::Upper)
        })
        .keywords(["case", "upper"]),
        CommandSpec::new("lowercase", "Lowercase", |surface, _args| {
            convert_case(surface, CaseConversion::Lower)
        })
        .keywords(["case", "lower"]),
        CommandSpec::new("titlecase", "Title case", |surface, _args| {
            convert_case(surface, CaseConversion::Title)
        })
        .keywords(["case", "title"]),
        CommandSpec::new("link", "Link", |surface, args| {
            let href = arg_str(&args, "href")
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .ok_or_else(|| invalid("link", "expected an href"))?;
            insert_link(surface, &normalize_href(href))
        })
        .description("Link the selection, or insert the address as a link at the caret.")
        .keywords(["link", "url", "anchor"])
        .args_example(serde_json::json!({ "href": "https://example.com" })),
        CommandSpec::new("unlink", "Remove link", |surface, _args| unlink(surface))
            .keywords(["link", "unlink"]),
        CommandSpec::new("align", "Align", |surface, args| {
            let value = arg_str(&args, "align").unwrap_or("left");
            if !matches!(value, "left" | "center" | "right" | "justify") {
                return Err(invalid("align", format!("unknown alignment {value:?}")));
            }
            align_blocks(surface, value)
        })
        .keywords(["align", "justify", "center"])
        .args_example(serde_json::json!({ "align": "center" })),
        CommandSpec::new("clear_formatting", "Clear formatting", |surface, _args| {
            clear_formatting(surface)
        })
        .description("Remove inline formatting from the selection. Links are kept.")
        .keywords(["clear", "formatting", "plain"]),
        CommandSpec::new("bulleted_list", "Bulleted list", |surface, _args| {
            toggle_bulleted_list(surface)
        })
        .keywords(["list", "bullet", "ul"]),
        CommandSpec::new("horizontal_rule", "Divider", |surface, _args| {
            let rule = surface.doc_mut().create_element("hr");
            surface.insert_node_at_selection(rule).map_err(Into::into)
        })
        .keywords(["divider", "rule", "hr"]),
        CommandSpec::new("checklist", "Checklist", |surface, _args| {
            insert_checklist(surface)
        })
        .keywords(["todo", "checklist", "task"]),
        CommandSpec::new("table", "Insert table", |surface, args| {
            let rows = arg_u64(&args, "rows").unwrap_or(3).clamp(1, 64) as usize;
            let cols = arg_u64(&args, "cols").unwrap_or(3).clamp(1, 16) as usize;
            let style = match arg_str(&args, "style") {
                Some(name) => TableStyle::parse(name)
                    .ok_or_else(|| invalid("table", format!("unknown style {name:?}")))?,
                None => TableStyle::default(),
            };
            insert_table(surface, rows, cols, style)
        })
        .description("Insert a table with a header row at the caret.")
        .keywords(["table", "grid"])
        .args_example(serde_json::json!({ "rows": 3, "cols": 3, "style": "striped" })),
    ]
}

fn toggle_heading(surface: &mut Surface, level: u8) -> Result<(), CommandError> {
    let tag = format!("h{level}");
    let blocks = surface.selected_blocks()?;
    let already = !blocks.is_empty()
        && blocks
            .iter()
            .all(|&b| surface.doc().tag(b) == Some(tag.as_str()));
    let block = if already {
        BlockType::Paragraph
    } else {
        BlockType::Heading(level)
    };
    surface.set_block_type(block).map_err(Into::into)
}

fn top_level_blocks(surface: &mut Surface) -> Result<Vec<NodeId>, CommandError> {
    let mut tops = Vec::new();
    for block in surface.selected_blocks()? {
        if let Some(top) = surface.top_level_of(block)
            && !surface.is_widget(top)
            && !tops.contains(&top)
        {
            tops.push(top);
        }
    }
    Ok(tops)
}

fn toggle_blockquote(surface: &mut Surface) -> Result<(), CommandError> {
    let tops = top_level_blocks(surface)?;
    let Some(&first) = tops.first() else {
        return Ok(());
    };
    let doc = surface.doc_mut();
    if tops.iter().all(|&t| doc.is_element(t, "blockquote")) {
        for quote in tops {
            doc.unwrap(quote)?;
        }
        return Ok(());
    }
    let quote = doc.create_element("blockquote");
    doc.insert_before(first, quote)?;
    for top in tops {
        if doc.is_element(top, "blockquote") {
            for child in doc.children(top).to_vec() {
                doc.append_child(quote, child)?;
            }
            doc.detach(top)?;
        } else {
            doc.append_child(quote, top)?;
        }
    }
    Ok(())
}

fn wrap_in_span(surface: &mut Surface, style: &str) -> Result<(), CommandError> {
    if surface.selection().is_none_or(|s| s.is_collapsed()) {
        debug!("inline style on a collapsed selection is a no-op");
        return Ok(());
    }
    let span = surface.doc_mut().create_element("span");
    surface.doc_mut().set_attr(span, "style", style)?;
    surface.wrap_selection(span)?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum CaseConversion {
    Upper,
    Lower,
    Title,
}

fn convert_case(surface: &mut Surface, conversion: CaseConversion) -> Result<(), CommandError> {
    let texts = surface.split_selection()?;
    let mut word_start = true;
    for &text in &texts {
        let current = surface.doc().text(text).unwrap_or_default().to_string();
        let converted = match conversion {
            CaseConversion::Upper => current.to_uppercase(),
            CaseConversion::Lower => current.to_lowercase(),
            CaseConversion::Title => {
                let mut out = String::with_capacity(current.len());
                for ch in current.chars() {
                    if ch.is_whitespace() {
                        word_start = true;
                        out.push(ch);
                    } else if word_start {
                        word_start = false;
                        out.extend(ch.to_uppercase());
                    } else {
                        out.extend(ch.to_lowercase());
                    }
                }
                out
            }
        };
        surface.doc_mut().set_text(text, converted)?;
    }
    if let (Some(&first), Some(&last)) = (texts.first(), texts.last()) {
        let end = surface.doc().text(last).map(str::len).unwrap_or(0);
        surface.set_selection(Selection::range(
            Position::new(first, 0),
            Position::new(last, end),
        ))?;
    }
    Ok(())
}

fn normalize_href(href: &str) -> String {
    let lower = href.to_ascii_lowercase();
    let has_scheme = ["http://", "https://", "mailto:", "tel:", "ftp://", "/", "#"]
        .iter()
        .any(|p| lower.starts_with(p));
    if has_scheme {
        href.to_string()
    } else {
        format!("https://{href}")
    }
}

fn insert_link(surface: &mut Surface, href: &str) -> Result<(), CommandError> {
    let anchor = surface.doc_mut().create_element("a");
    surface.doc_mut().set_attr(anchor, "href", href)?;
    if surface.selection().is_some_and(|s| !s.is_collapsed()) {
        surface.wrap_selection(anchor)?;
        return Ok(());
    }
    let label = surface.doc_mut().create_text(href);
    surface.doc_mut().append_child(anchor, label)?;
    surface.insert_node_at_selection(anchor)?;
    Ok(())
}

/// Text nodes from the selection start to its end, or the caret's node.
fn touched_nodes(surface: &mut Surface) -> Result<Vec<NodeId>, CommandError> {
    let Some((start, end)) = surface.ordered_range() else {
        return Ok(vec![surface.caret_text_position()?.node]);
    };
    let doc = surface.doc();
    let mut nodes = vec![start.node];
    let mut cursor = (start.node != end.node)
        .then(|| doc.next_in_order(start.node))
        .flatten();
    while let Some(node) = cursor {
        if doc.is_text(node) {
            nodes.push(node);
        }
        if node == end.node {
            break;
        }
        cursor = doc.next_in_order(node);
    }
    Ok(nodes)
}

fn unlink(surface: &mut Surface) -> Result<(), CommandError> {
    let nodes = touched_nodes(surface)?;
    let doc = surface.doc_mut();
    let mut anchors: Vec<NodeId> = Vec::new();
    for node in nodes {
        if let Some(anchor) = doc.closest_tag(node, "a")
            && !anchors.contains(&anchor)
        {
            anchors.push(anchor);
        }
    }
    for anchor in anchors {
        doc.unwrap(anchor)?;
    }
    Ok(())
}

fn align_blocks(surface: &mut Surface, value: &str) -> Result<(), CommandError> {
    for block in surface.selected_blocks()? {
        if surface.is_widget(block) {
            continue;
        }
        let doc = surface.doc_mut();
        if value == "left" {
            doc.remove_style_property(block, "text-align")?;
        } else {
            doc.set_style_property(block, "text-align", value)?;
        }
    }
    Ok(())
}

const FORMATTING_TAGS: &[&str] = &[
    "b", "strong", "i", "em", "u", "s", "strike", "del", "code", "span", "font", "mark", "sub",
    "sup", "small", "big",
];

fn formatting_ancestor(doc: &Document, node: NodeId) -> Option<NodeId> {
    doc.ancestors(node)
        .take_while(|&n| !doc.tag(n).is_some_and(note_markup::is_block_tag))
        .find(|&n| doc.tag(n).is_some_and(|t| FORMATTING_TAGS.contains(&t)))
}

fn clear_formatting(surface: &mut Surface) -> Result<(), CommandError> {
    let texts = surface.split_selection()?;
    let doc = surface.doc_mut();
    for text in texts {
        while let Some(styled) = formatting_ancestor(doc, text) {
            doc.isolate(text, styled)?;
            doc.unwrap(styled)?;
        }
    }
    Ok(())
}

fn toggle_bulleted_list(surface: &mut Surface) -> Result<(), CommandError> {
    let caret = surface.caret_text_position()?;
    let list = surface.doc().closest(caret.node, |d, n| {
        d.is_element(n, "ul") && !d.has_class(n, CHECKLIST_CLASS)
    });

    if let Some(list) = list {
        let doc = surface.doc_mut();
        for item in doc.children(list).to_vec() {
            let paragraph = doc.create_element("p");
            for child in doc.children(item).to_vec() {
                doc.append_child(paragraph, child)?;
            }
            doc.insert_before(list, paragraph)?;
        }
        doc.detach(list)?;
        return Ok(());
    }

    let (cells, blocks): (Vec<NodeId>, Vec<NodeId>) = surface
        .selected_blocks()?
        .into_iter()
        .filter(|&b| !surface.is_widget(b))
        .partition(|&b| is_table_cell(surface.doc(), b));
    let doc = surface.doc_mut();
    // A cell keeps its place in the row; the list goes inside it.
    for cell in cells {
        let list = doc.create_element("ul");
        let item = doc.create_element("li");
        for child in doc.children(cell).to_vec() {
            doc.append_child(item, child)?;
        }
        doc.append_child(list, item)?;
        doc.append_child(cell, list)?;
    }
    let Some(&first) = blocks.first() else {
        return Ok(());
    };
    let list = doc.create_element("ul");
    doc.insert_before(first, list)?;
    for block in blocks {
        let item = doc.create_element("li");
        for child in doc.children(block).to_vec() {
            doc.append_child(item, child)?;
        }
        doc.append_child(list, item)?;
        doc.detach(block)?;
    }
    Ok(())
}

fn insert_checklist(surface: &mut Surface) -> Result<(), CommandError> {
    let (list, span) = build_checklist(surface.doc_mut(), &[])
        .map_err(|e| invalid("checklist", e.to_string()))?;
    surface.insert_node_at_selection(list)?;
    surface.set_selection(Selection::caret(span, 0))?;
    surface.caret_text_position()?;
    Ok(())
}

fn insert_table(
    surface: &mut Surface,
    rows: usize,
    cols: usize,
    style: TableStyle,
) -> Result<(), CommandError> {
    let table = build_table(surface.doc_mut(), rows, cols, style);
    surface.insert_node_at_selection(table)?;
    if let Some(cell) = surface
        .doc()
        .find_first(table, |d, n| d.is_element(n, "th") || d.is_element(n, "td"))
    {
        surface.set_selection(Selection::caret(cell, 0))?;
    }
    Ok(())
}

fn is_table_cell(doc: &Document, node: NodeId) -> bool {
    doc.is_element(node, "td") || doc.is_element(node, "th")
}
