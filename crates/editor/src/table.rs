use note_markup::{Document, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WidgetError;
use crate::widgets::{TABLE_HANDLE_CLASS, WIDGET_ATTR, WidgetKind};

pub const TABLE_STYLE_ATTR: &str = "data-table-style";
pub const TABLE_WIDTH_ATTR: &str = "data-width";
pub const TABLE_WRAPPER_CLASS: &str = "note-table-wrapper";
pub const TABLE_CLASS: &str = "note-table";

const MAX_ROWS: usize = 64;
const MAX_COLS: usize = 16;

/// Visual preset of a table. Only borders, stripes and shadow change;
/// structure is identical for every preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStyle {
    #[default]
    Default,
    Striped,
    Bordered,
    Minimal,
    Shadow,
}

impl TableStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            TableStyle::Default => "default",
            TableStyle::Striped => "striped",
            TableStyle::Bordered => "bordered",
            TableStyle::Minimal => "minimal",
            TableStyle::Shadow => "shadow",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default" => Some(TableStyle::Default),
            "striped" => Some(TableStyle::Striped),
            "bordered" => Some(TableStyle::Bordered),
            "minimal" => Some(TableStyle::Minimal),
            "shadow" => Some(TableStyle::Shadow),
            _ => None,
        }
    }

    fn cell_style(self, header: bool) -> &'static str {
        match (self, header) {
            (TableStyle::Bordered, _) => "border: 2px solid #9ca3af; padding: 8px;",
            (TableStyle::Minimal, true) => "border-bottom: 2px solid #e5e7eb; padding: 8px;",
            (TableStyle::Minimal, false) => "border-bottom: 1px solid #f3f4f6; padding: 8px;",
            (_, true) => "border: 1px solid #d1d5db; padding: 8px; background-color: #f9fafb;",
            (_, false) => "border: 1px solid #d1d5db; padding: 8px;",
        }
    }

    fn wrapper_style(self, width_pct: f64) -> String {
        match self {
            TableStyle::Shadow => format!(
                "width: {}%; box-shadow: 0 2px 8px rgba(0, 0, 0, 0.12);",
                format_pct(width_pct)
            ),
            _ => format!("width: {}%;", format_pct(width_pct)),
        }
    }

    fn stripe(self) -> Option<&'static str> {
        match self {
            TableStyle::Striped => Some("background-color: #f3f4f6;"),
            _ => None,
        }
    }
}

fn format_pct(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value:.1}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPlacement {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPlacement {
    Left,
    Right,
}

/// Markup for a fresh table: one header row plus `rows - 1` body rows.
pub fn generate_table_html(rows: usize, cols: usize, style: TableStyle) -> String {
    let mut doc = Document::new();
    let table = build_table(&mut doc, rows, cols, style);
    doc.outer_html(table)
}

/// Builds a detached table widget inside `doc` and returns its wrapper.
pub fn build_table(doc: &mut Document, rows: usize, cols: usize, style: TableStyle) -> NodeId {
    let rows = rows.clamp(1, MAX_ROWS);
    let cols = cols.clamp(1, MAX_COLS);

    let wrapper = doc.create_element("div");
    let table = doc.create_element("table");
    let thead = doc.create_element("thead");
    let tbody = doc.create_element("tbody");
    // Fresh nodes are elements, so none of these attribute writes can fail.
    let _ = doc.set_attr(wrapper, "class", TABLE_WRAPPER_CLASS);
    let _ = doc.set_attr(wrapper, WIDGET_ATTR, WidgetKind::Table.as_str());
    let _ = doc.set_attr(wrapper, TABLE_STYLE_ATTR, style.as_str());
    let _ = doc.set_attr(wrapper, TABLE_WIDTH_ATTR, "100");
    let _ = doc.set_attr(wrapper, "style", style.wrapper_style(100.0));
    let _ = doc.set_attr(wrapper, "contenteditable", "false");
    let _ = doc.set_attr(
        table,
        "class",
        format!("{TABLE_CLASS} table-style-{}", style.as_str()),
    );

    let header = new_row(doc, cols, style, true);
    let _ = doc.append_child(thead, header);
    for _ in 1..rows {
        let row = new_row(doc, cols, style, false);
        let _ = doc.append_child(tbody, row);
    }

    let handle = doc.create_element("span");
    let _ = doc.set_attr(handle, "class", TABLE_HANDLE_CLASS);
    let _ = doc.append_child(table, thead);
    let _ = doc.append_child(table, tbody);
    let _ = doc.append_child(wrapper, table);
    let _ = doc.append_child(wrapper, handle);
    restripe(doc, wrapper);
    wrapper
}

fn new_cell(doc: &mut Document, style: TableStyle, header: bool) -> NodeId {
    let cell = doc.create_element(if header { "th" } else { "td" });
    let _ = doc.set_attr(cell, "contenteditable", "true");
    let _ = doc.set_attr(cell, "style", style.cell_style(header));
    let br = doc.create_element("br");
    let _ = doc.append_child(cell, br);
    cell
}

fn new_row(doc: &mut Document, cols: usize, style: TableStyle, header: bool) -> NodeId {
    let row = doc.create_element("tr");
    for _ in 0..cols {
        let cell = new_cell(doc, style, header);
        let _ = doc.append_child(row, cell);
    }
    row
}

/// Style preset recorded on a table wrapper.
pub fn table_style(doc: &Document, wrapper: NodeId) -> TableStyle {
    doc.attr(wrapper, TABLE_STYLE_ATTR)
        .and_then(TableStyle::parse)
        .unwrap_or_default()
}

fn table_element(doc: &Document, wrapper: NodeId) -> Option<NodeId> {
    if doc.is_element(wrapper, "table") {
        return Some(wrapper);
    }
    doc.find_first(wrapper, |d, n| d.is_element(n, "table"))
}

/// Every `tr` of the table in visual order (header rows first).
pub fn rows(doc: &Document, wrapper: NodeId) -> Vec<NodeId> {
    let Some(table) = table_element(doc, wrapper) else {
        return Vec::new();
    };
    doc.find_all(table, |d, n| d.is_element(n, "tr"))
}

fn cells(doc: &Document, row: NodeId) -> Vec<NodeId> {
    doc.children(row)
        .iter()
        .copied()
        .filter(|&c| doc.is_element(c, "td") || doc.is_element(c, "th"))
        .collect()
}

pub fn dimensions(doc: &Document, wrapper: NodeId) -> (usize, usize) {
    let rows = rows(doc, wrapper);
    let cols = rows.iter().map(|&r| cells(doc, r).len()).max().unwrap_or(0);
    (rows.len(), cols)
}

/// Row and column index of the cell containing `node`.
pub fn cell_coordinates(doc: &Document, node: NodeId) -> Option<(NodeId, usize, usize)> {
    let cell = doc.closest(node, |d, n| d.is_element(n, "td") || d.is_element(n, "th"))?;
    let row = doc.parent(cell)?;
    let wrapper = doc.closest(row, |d, n| d.attr(n, WIDGET_ATTR) == Some("table"))?;
    let row_ix = rows(doc, wrapper).iter().position(|&r| r == row)?;
    let col_ix = cells(doc, row).iter().position(|&c| c == cell)?;
    Some((wrapper, row_ix, col_ix))
}

fn is_header_row(doc: &Document, row: NodeId) -> bool {
    doc.parent(row).is_some_and(|p| doc.is_element(p, "thead"))
}

pub fn insert_row(
    doc: &mut Document,
    wrapper: NodeId,
    index: usize,
    placement: RowPlacement,
) -> Result<NodeId, WidgetError> {
    let style = table_style(doc, wrapper);
    let all_rows = rows(doc, wrapper);
    let (_, cols) = dimensions(doc, wrapper);
    let reference = *all_rows
        .get(index.min(all_rows.len().saturating_sub(1)))
        .ok_or(WidgetError::NotAWidget)?;

    let row = new_row(doc, cols.max(1), style, false);
    match (placement, is_header_row(doc, reference)) {
        // Nothing goes above or beside the header inside thead; body rows
        // start at the top of tbody instead.
        (_, true) => {
            let tbody = ensure_tbody(doc, wrapper)?;
            doc.insert_child(tbody, 0, row)?;
        }
        (RowPlacement::Above, false) => doc.insert_before(reference, row)?,
        (RowPlacement::Below, false) => doc.insert_after(reference, row)?,
    }
    restripe(doc, wrapper);
    Ok(row)
}

pub fn insert_column(
    doc: &mut Document,
    wrapper: NodeId,
    index: usize,
    placement: ColumnPlacement,
) -> Result<(), WidgetError> {
    let style = table_style(doc, wrapper);
    for row in rows(doc, wrapper) {
        let header = is_header_row(doc, row);
        let row_cells = cells(doc, row);
        let cell = new_cell(doc, style, header);
        match row_cells.get(index.min(row_cells.len().saturating_sub(1))) {
            Some(&reference) => match placement {
                ColumnPlacement::Left => doc.insert_before(reference, cell)?,
                ColumnPlacement::Right => doc.insert_after(reference, cell)?,
            },
            None => doc.append_child(row, cell)?,
        }
    }
    Ok(())
}

/// Removes a row. A table always keeps at least one row, so deleting the
/// last one is a no-op that returns false.
pub fn delete_row(doc: &mut Document, wrapper: NodeId, index: usize) -> Result<bool, WidgetError> {
    let all_rows = rows(doc, wrapper);
    if all_rows.len() <= 1 {
        debug!("refusing to delete the last table row");
        return Ok(false);
    }
    let Some(&row) = all_rows.get(index) else {
        return Ok(false);
    };

    let header = is_header_row(doc, row);
    doc.detach(row)?;

    if header {
        let thead = doc
            .find_first(wrapper, |d, n| d.is_element(n, "thead"))
            .ok_or(WidgetError::NotAWidget)?;
        if doc.children(thead).is_empty()
            && let Some(&promoted) = rows(doc, wrapper).first()
        {
            promote_to_header(doc, wrapper, promoted)?;
            doc.append_child(thead, promoted)?;
        }
    }
    restripe(doc, wrapper);
    Ok(true)
}

/// Removes a column. Deleting the last remaining column is a no-op.
pub fn delete_column(
    doc: &mut Document,
    wrapper: NodeId,
    index: usize,
) -> Result<bool, WidgetError> {
    let (_, cols) = dimensions(doc, wrapper);
    if cols <= 1 || index >= cols {
        debug!(cols, index, "refusing to delete table column");
        return Ok(false);
    }
    for row in rows(doc, wrapper) {
        if let Some(&cell) = cells(doc, row).get(index) {
            doc.detach(cell)?;
        }
    }
    Ok(true)
}

fn promote_to_header(doc: &mut Document, wrapper: NodeId, row: NodeId) -> Result<(), WidgetError> {
    let style = table_style(doc, wrapper);
    for cell in cells(doc, row) {
        let th = doc.create_element("th");
        doc.set_attr(th, "contenteditable", "true")?;
        doc.set_attr(th, "style", style.cell_style(true))?;
        for child in doc.children(cell).to_vec() {
            doc.append_child(th, child)?;
        }
        doc.replace(cell, th)?;
    }
    doc.remove_attr(row, "style");
    Ok(())
}

fn ensure_tbody(doc: &mut Document, wrapper: NodeId) -> Result<NodeId, WidgetError> {
    if let Some(tbody) = doc.find_first(wrapper, |d, n| d.is_element(n, "tbody")) {
        return Ok(tbody);
    }
    let table = table_element(doc, wrapper).ok_or(WidgetError::NotAWidget)?;
    let tbody = doc.create_element("tbody");
    doc.append_child(table, tbody)?;
    Ok(tbody)
}

/// Re-applies alternating body row backgrounds for striped tables.
pub fn restripe(doc: &mut Document, wrapper: NodeId) {
    let stripe = table_style(doc, wrapper).stripe();
    let body_rows: Vec<NodeId> = rows(doc, wrapper)
        .into_iter()
        .filter(|&r| !is_header_row(doc, r))
        .collect();
    for (ix, row) in body_rows.into_iter().enumerate() {
        match stripe {
            Some(style) if ix % 2 == 1 => {
                let _ = doc.set_attr(row, "style", style);
            }
            _ => {
                doc.remove_attr(row, "style");
            }
        }
    }
}

pub fn set_width_pct(doc: &mut Document, wrapper: NodeId, pct: f64) -> Result<(), WidgetError> {
    let style = table_style(doc, wrapper);
    doc.set_attr(wrapper, TABLE_WIDTH_ATTR, format_pct(pct))?;
    doc.set_attr(wrapper, "style", style.wrapper_style(pct))?;
    Ok(())
}

/// Context-menu target captured from a context-click or long-press on a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableMenu {
    pub table: NodeId,
    pub row: usize,
    pub col: usize,
    pub position: (f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableMenuAction {
    InsertRowAbove,
    InsertRowBelow,
    InsertColumnLeft,
    InsertColumnRight,
    DeleteRow,
    DeleteColumn,
    DeleteTable,
}

impl TableMenu {
    pub fn open(doc: &Document, target: NodeId, position: (f64, f64)) -> Option<Self> {
        let (table, row, col) = cell_coordinates(doc, target)?;
        Some(Self {
            table,
            row,
            col,
            position,
        })
    }

    /// Applies a structural edit. Returns whether the table changed.
    pub fn apply(&self, doc: &mut Document, action: TableMenuAction) -> Result<bool, WidgetError> {
        if !doc.is_attached(self.table) {
            return Err(WidgetError::NotAWidget);
        }
        match action {
            TableMenuAction::InsertRowAbove => {
                insert_row(doc, self.table, self.row, RowPlacement::Above).map(|_| true)
            }
            TableMenuAction::InsertRowBelow => {
                insert_row(doc, self.table, self.row, RowPlacement::Below).map(|_| true)
            }
            TableMenuAction::InsertColumnLeft => {
                insert_column(doc, self.table, self.col, ColumnPlacement::Left).map(|_| true)
            }
            TableMenuAction::InsertColumnRight => {
                insert_column(doc, self.table, self.col, ColumnPlacement::Right).map(|_| true)
            }
            TableMenuAction::DeleteRow => delete_row(doc, self.table, self.row),
            TableMenuAction::DeleteColumn => delete_column(doc, self.table, self.col),
            TableMenuAction::DeleteTable => {
                doc.detach(self.table)?;
                Ok(true)
            }
        }
    }
}
