use crate::node::{Document, NodeId};
use crate::MarkupError;

/// Parses an inline `style` attribute into ordered `(property, value)` pairs.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            (!prop.is_empty() && !value.is_empty()).then(|| (prop, value.to_string()))
        })
        .collect()
}

pub fn format_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(prop, value)| format!("{prop}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Document {
    pub fn style_property(&self, id: NodeId, prop: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        parse_declarations(style)
            .into_iter()
            .find(|(p, _)| p == prop)
            .map(|(_, v)| v)
    }

    pub fn set_style_property(
        &mut self,
        id: NodeId,
        prop: &str,
        value: &str,
    ) -> Result<(), MarkupError> {
        let mut decls = parse_declarations(self.attr(id, "style").unwrap_or(""));
        match decls.iter_mut().find(|(p, _)| p == prop) {
            Some((_, v)) => *v = value.to_string(),
            None => decls.push((prop.to_string(), value.to_string())),
        }
        self.set_attr(id, "style", format_declarations(&decls))
    }

    pub fn remove_style_property(&mut self, id: NodeId, prop: &str) -> Result<(), MarkupError> {
        let mut decls = parse_declarations(self.attr(id, "style").unwrap_or(""));
        let before = decls.len();
        decls.retain(|(p, _)| p != prop);
        if decls.len() == before {
            return Ok(());
        }
        if decls.is_empty() {
            self.remove_attr(id, "style");
            Ok(())
        } else {
            self.set_attr(id, "style", format_declarations(&decls))
        }
    }
}

/// Reads a leading number out of CSS values like `300px` or `45.5%`.
pub fn css_number(value: &str) -> Option<f64> {
    let value = value.trim();
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(value.len());
    value[..end].parse().ok()
}
