use std::ops::Range;

use note_markup::{Document, NodeId, clamp_to_char_boundary};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::SmartLinkConfig;
use crate::error::SurfaceError;
use crate::surface::Position;

pub const SMART_LINK_CLASS: &str = "smart-link";

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}";
const URL_PATTERN: &str = r"(?i)\b(?:https?://[^\s<>]+|www\.[^\s<>]+|[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)*\.[a-z]{2,}(?:/[^\s<>]*)?)";
const PHONE_PATTERN: &str = r"\+?\(?\d[\d\s().\-]{5,}\d";
const MIN_PHONE_DIGITS: usize = 7;
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', '\'', '"'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Url,
    Email,
    Phone,
}

impl LinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::Url => "url",
            LinkKind::Email => "email",
            LinkKind::Phone => "phone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: LinkKind,
    pub range: Range<usize>,
    pub href: String,
}

/// Result of a successful scan: the anchor that now wraps the match and
/// where the caret moved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartLink {
    pub kind: LinkKind,
    pub href: String,
    pub anchor: NodeId,
    pub caret: Position,
}

pub struct SmartDetector {
    config: SmartLinkConfig,
    email: Regex,
    url: Regex,
    phone: Regex,
}

impl SmartDetector {
    pub fn new(config: SmartLinkConfig) -> Self {
        Self {
            config,
            email: Regex::new(EMAIL_PATTERN).expect("email pattern must compile"),
            url: Regex::new(URL_PATTERN).expect("url pattern must compile"),
            phone: Regex::new(PHONE_PATTERN).expect("phone pattern must compile"),
        }
    }

    pub fn config(&self) -> SmartLinkConfig {
        self.config
    }

    pub fn set_config(&mut self, config: SmartLinkConfig) {
        self.config = config;
    }

    /// Every accepted candidate in `text`, emails first; URL and phone
    /// matches overlapping an accepted span are dropped.
    pub fn candidates(&self, text: &str) -> Vec<Candidate> {
        let mut found: Vec<Candidate> = Vec::new();

        if self.config.email_addresses {
            for m in self.email.find_iter(text) {
                found.push(Candidate {
                    kind: LinkKind::Email,
                    range: m.range(),
                    href: format!("mailto:{}", m.as_str()),
                });
            }
        }

        if self.config.urls {
            for m in self.url.find_iter(text) {
                let trimmed = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
                if trimmed.is_empty() {
                    continue;
                }
                let range = m.start()..m.start() + trimmed.len();
                if overlaps_any(&found, &range) {
                    trace!(candidate = trimmed, "url overlaps an existing match");
                    continue;
                }
                found.push(Candidate {
                    kind: LinkKind::Url,
                    range,
                    href: url_href(trimmed),
                });
            }
        }

        if self.config.phone_numbers {
            for m in self.phone.find_iter(text) {
                let candidate = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
                let digits: String = candidate.chars().filter(char::is_ascii_digit).collect();
                if digits.len() < MIN_PHONE_DIGITS {
                    trace!(candidate, "too few digits for a phone number");
                    continue;
                }
                let range = m.start()..m.start() + candidate.len();
                if overlaps_any(&found, &range) {
                    continue;
                }
                found.push(Candidate {
                    kind: LinkKind::Phone,
                    range,
                    href: format!("tel:{digits}"),
                });
            }
        }

        found.sort_by_key(|c| c.range.start);
        found
    }

    /// Scans the part of `text_node` before `caret_offset` and links at most
    /// one candidate: the one closest to the caret that has a terminator
    /// typed after it.
    pub fn scan(
        &self,
        doc: &mut Document,
        text_node: NodeId,
        caret_offset: usize,
    ) -> Result<Option<SmartLink>, SurfaceError> {
        self.link_nearest(doc, text_node, caret_offset, false)
    }

    /// Scans a text node that a line break was just typed after. The end of
    /// the node counts as a terminator.
    pub fn scan_line_end(
        &self,
        doc: &mut Document,
        text_node: NodeId,
    ) -> Result<Option<SmartLink>, SurfaceError> {
        let end = doc.text(text_node).map_or(0, str::len);
        self.link_nearest(doc, text_node, end, true)
    }

    fn link_nearest(
        &self,
        doc: &mut Document,
        text_node: NodeId,
        caret_offset: usize,
        terminated: bool,
    ) -> Result<Option<SmartLink>, SurfaceError> {
        if !self.config.any_enabled() {
            return Ok(None);
        }
        let Some(text) = doc.text(text_node) else {
            return Ok(None);
        };
        if doc.closest_tag(text_node, "a").is_some() {
            return Ok(None);
        }

        let caret_offset = clamp_to_char_boundary(text, caret_offset);
        let prefix = &text[..caret_offset];
        let Some(candidate) = self
            .candidates(prefix)
            .into_iter()
            .filter(|c| c.range.end < prefix.len() || (terminated && c.range.end == prefix.len()))
            .max_by_key(|c| c.range.end)
        else {
            return Ok(None);
        };

        let link_node = if candidate.range.start > 0 {
            doc.split_text(text_node, candidate.range.start)?
        } else {
            text_node
        };
        let after = doc.split_text(link_node, candidate.range.len())?;

        let anchor = doc.create_element("a");
        doc.set_attr(anchor, "href", candidate.href.clone())?;
        doc.set_attr(anchor, "class", SMART_LINK_CLASS)?;
        doc.set_attr(anchor, "data-link-kind", candidate.kind.as_str())?;
        doc.wrap(link_node, anchor)?;

        trace!(kind = candidate.kind.as_str(), href = %candidate.href, "smart link created");
        Ok(Some(SmartLink {
            kind: candidate.kind,
            href: candidate.href,
            anchor,
            caret: Position::new(after, caret_offset - candidate.range.end),
        }))
    }
}

fn overlaps_any(found: &[Candidate], range: &Range<usize>) -> bool {
    found
        .iter()
        .any(|c| c.range.start < range.end && range.start < c.range.end)
}

fn url_href(matched: &str) -> String {
    let lower = matched.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        matched.to_string()
    } else {
        format!("https://{matched}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> SmartDetector {
        SmartDetector::new(SmartLinkConfig::default())
    }

    #[test]
    fn url_candidates_drop_trailing_punctuation() {
        let found = detector().candidates("see www.example.org/docs. ok");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, LinkKind::Url);
        assert_eq!(found[0].href, "https://www.example.org/docs");
    }

    #[test]
    fn email_domain_is_not_reported_as_url() {
        let found = detector().candidates("mail user@example.com now");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, LinkKind::Email);
    }

    #[test]
    fn phone_requires_seven_digits() {
        assert!(detector().candidates("in 2024 we met 12-34").is_empty());
        let found = detector().candidates("call +1 (555) 123-4567 today");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].href, "tel:15551234567");
    }

    #[test]
    fn plain_words_and_dotted_numbers_are_ignored() {
        assert!(detector().candidates("not-an-email and 3.14").is_empty());
    }
}
