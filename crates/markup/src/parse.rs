use crate::node::{Attr, Document, Element, NodeId, is_void_tag};
use crate::MarkupError;

const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea"];

impl Document {
    pub fn parse(markup: &str) -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        // Parsing into a fresh root cannot hit a cycle or a missing parent.
        let _ = doc.parse_into(root, markup);
        doc
    }

    /// Replaces every child of `parent` with the nodes parsed from `markup`.
    pub fn set_inner_html(&mut self, parent: NodeId, markup: &str) -> Result<(), MarkupError> {
        self.clear_children(parent)?;
        self.parse_into(parent, markup)
    }

    /// Parses `markup` as a fragment and returns the top-level nodes, detached.
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>, MarkupError> {
        let holder = self.create_element("div");
        self.parse_into(holder, markup)?;
        let nodes = self.children(holder).to_vec();
        self.clear_children(holder)?;
        Ok(nodes)
    }

    fn parse_into(&mut self, parent: NodeId, markup: &str) -> Result<(), MarkupError> {
        let mut stack: Vec<NodeId> = vec![parent];
        let mut cursor = 0usize;
        let bytes = markup.as_bytes();

        while cursor < markup.len() {
            let current = *stack.last().unwrap_or(&parent);

            if bytes[cursor] != b'<' {
                let end = markup[cursor..]
                    .find('<')
                    .map(|ix| cursor + ix)
                    .unwrap_or(markup.len());
                self.push_text(current, &decode_entities(&markup[cursor..end]))?;
                cursor = end;
                continue;
            }

            let rest = &markup[cursor..];
            if let Some(body) = rest.strip_prefix("<!--") {
                let (comment, consumed) = match body.find("-->") {
                    Some(end) => (&body[..end], 4 + end + 3),
                    None => (body, rest.len()),
                };
                let node = self.create_comment(comment);
                self.append_child(current, node)?;
                cursor += consumed;
                continue;
            }

            if rest.starts_with("<!") || rest.starts_with("<?") {
                cursor += rest.find('>').map(|ix| ix + 1).unwrap_or(rest.len());
                continue;
            }

            if let Some(body) = rest.strip_prefix("</") {
                let end = body.find('>').unwrap_or(body.len());
                let name = body[..end].trim().to_ascii_lowercase();
                if let Some(pos) = stack
                    .iter()
                    .skip(1)
                    .rposition(|&n| self.tag(n) == Some(name.as_str()))
                {
                    stack.truncate(pos + 1);
                }
                cursor += 2 + (end + 1).min(body.len());
                continue;
            }

            let Some((element, self_closing, consumed)) = parse_open_tag(rest) else {
                self.push_text(current, "<")?;
                cursor += 1;
                continue;
            };
            cursor += consumed;

            let tag = element.tag.clone();
            let node = self.create_element_with(element);
            self.append_child(current, node)?;

            if RAW_TEXT_TAGS.contains(&tag.as_str()) {
                let close = format!("</{tag}");
                let lower = markup[cursor..].to_ascii_lowercase();
                let end = lower.find(&close).map(|ix| cursor + ix).unwrap_or(markup.len());
                if end > cursor {
                    let text = self.create_text(&markup[cursor..end]);
                    self.append_child(node, text)?;
                }
                cursor = markup[end..]
                    .find('>')
                    .map(|ix| end + ix + 1)
                    .unwrap_or(markup.len());
                continue;
            }

            if !self_closing && !is_void_tag(&tag) {
                stack.push(node);
            }
        }

        Ok(())
    }

    fn push_text(&mut self, parent: NodeId, text: &str) -> Result<(), MarkupError> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(last) = self.last_child(parent)
            && let Some(existing) = self.text(last)
        {
            let merged = format!("{existing}{text}");
            return self.set_text(last, merged);
        }
        let node = self.create_text(text);
        self.append_child(parent, node)
    }
}

fn parse_open_tag(input: &str) -> Option<(Element, bool, usize)> {
    let bytes = input.as_bytes();
    let mut ix = 1usize;
    let name_start = ix;
    while ix < bytes.len() && (bytes[ix].is_ascii_alphanumeric() || bytes[ix] == b'-') {
        ix += 1;
    }
    if ix == name_start {
        return None;
    }
    let mut element = Element::new(&input[name_start..ix]);
    let mut self_closing = false;

    loop {
        while ix < bytes.len() && bytes[ix].is_ascii_whitespace() {
            ix += 1;
        }
        if ix >= bytes.len() {
            return Some((element, self_closing, ix));
        }
        match bytes[ix] {
            b'>' => return Some((element, self_closing, ix + 1)),
            b'/' => {
                self_closing = true;
                ix += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = ix;
        while ix < bytes.len()
            && !bytes[ix].is_ascii_whitespace()
            && !matches!(bytes[ix], b'=' | b'>' | b'/')
        {
            ix += 1;
        }
        if ix == attr_start {
            ix += 1;
            continue;
        }
        let name = input[attr_start..ix].to_ascii_lowercase();

        while ix < bytes.len() && bytes[ix].is_ascii_whitespace() {
            ix += 1;
        }
        let mut value = String::new();
        if ix < bytes.len() && bytes[ix] == b'=' {
            ix += 1;
            while ix < bytes.len() && bytes[ix].is_ascii_whitespace() {
                ix += 1;
            }
            if ix < bytes.len() && (bytes[ix] == b'"' || bytes[ix] == b'\'') {
                let quote = bytes[ix] as char;
                let start = ix + 1;
                let end = input[start..]
                    .find(quote)
                    .map(|e| start + e)
                    .unwrap_or(input.len());
                value = decode_entities(&input[start..end]);
                ix = (end + 1).min(input.len());
            } else {
                let start = ix;
                while ix < bytes.len() && !bytes[ix].is_ascii_whitespace() && bytes[ix] != b'>' {
                    ix += 1;
                }
                value = decode_entities(&input[start..ix]);
            }
        }

        if element.attr(&name).is_none() {
            element.attrs.push(Attr { name, value });
        }
        self_closing = false;
    }
}

pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';').filter(|&semi| semi <= 12) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_tag_parses_quoted_unquoted_and_bare_attributes() {
        let (el, self_closing, consumed) =
            parse_open_tag(r#"<input type=checkbox checked class="a b">rest"#).unwrap();
        assert_eq!(el.tag, "input");
        assert_eq!(el.attr("type"), Some("checkbox"));
        assert_eq!(el.attr("checked"), Some(""));
        assert_eq!(el.attr("class"), Some("a b"));
        assert!(!self_closing);
        assert_eq!(consumed, 41);
    }

    #[test]
    fn entities_decode_named_and_numeric_forms() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#65;&#x42;"), "a & b <c> AB");
        assert_eq!(decode_entities("fish & chips"), "fish & chips");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }
}
