use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_SCHEMA: &str = "note-editor/config";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

fn default_true() -> bool {
    true
}

/// Everything the editor reads from its host application. Owned and
/// persisted by the caller; nothing here is cached globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub smart_links: SmartLinkConfig,
    #[serde(default)]
    pub presentation: Presentation,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub widgets: WidgetLimits,
    #[serde(default)]
    pub toolbar: ToolbarConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            smart_links: SmartLinkConfig::default(),
            presentation: Presentation::default(),
            history: HistoryConfig::default(),
            host: HostConfig::default(),
            widgets: WidgetLimits::default(),
            toolbar: ToolbarConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartLinkConfig {
    #[serde(default = "default_true")]
    pub urls: bool,
    #[serde(default = "default_true")]
    pub phone_numbers: bool,
    #[serde(default = "default_true")]
    pub email_addresses: bool,
}

impl Default for SmartLinkConfig {
    fn default() -> Self {
        Self {
            urls: true,
            phone_numbers: true,
            email_addresses: true,
        }
    }
}

impl SmartLinkConfig {
    pub fn any_enabled(&self) -> bool {
        self.urls || self.phone_numbers || self.email_addresses
    }
}

/// Visual defaults applied to the editable root. Never serialized into the
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default = "default_true")]
    pub spellcheck: bool,
    #[serde(default = "Presentation::default_font_family")]
    pub font_family: String,
    #[serde(default = "Presentation::default_font_size")]
    pub font_size_px: u32,
}

impl Presentation {
    fn default_font_family() -> String {
        "system-ui, sans-serif".to_string()
    }

    fn default_font_size() -> u32 {
        16
    }
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            spellcheck: true,
            font_family: Self::default_font_family(),
            font_size_px: Self::default_font_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
    pub max_entries_large: usize,
    pub large_document_chars: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            max_entries_large: 10,
            large_document_chars: 50_000,
        }
    }
}

impl HistoryConfig {
    pub fn cap_for(&self, snapshot_len: usize) -> usize {
        let cap = if snapshot_len > self.large_document_chars {
            self.max_entries_large
        } else {
            self.max_entries
        };
        cap.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Discard the external update.
    Drop,
    /// Hold the newest external update and apply it on blur, unless a local
    /// commit happened after it arrived.
    #[default]
    DeferUntilBlur,
    /// Hand the conflict back to the caller as an error.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub large_content_chars: usize,
    #[serde(with = "millis")]
    pub debounce: Duration,
    pub conflict_policy: ConflictPolicy,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            large_content_chars: 50_000,
            debounce: Duration::from_millis(300),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetLimits {
    pub image_min_px: f64,
    pub image_max_px: f64,
    pub image_default_px: f64,
    pub table_min_pct: f64,
    pub table_max_pct: f64,
    pub max_file_bytes: usize,
}

impl Default for WidgetLimits {
    fn default() -> Self {
        Self {
            image_min_px: 50.0,
            image_max_px: 800.0,
            image_default_px: 300.0,
            table_min_pct: 20.0,
            table_max_pct: 100.0,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

impl WidgetLimits {
    /// Limits safe to clamp with: non-finite bounds fall back to the
    /// defaults, inverted ranges are swapped, and the default image width
    /// is pulled into range.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let finite_or = |value: f64, fallback: f64| {
            if value.is_finite() { value } else { fallback }
        };
        let ordered = |lo: f64, hi: f64| if lo <= hi { (lo, hi) } else { (hi, lo) };

        let (image_min_px, image_max_px) = ordered(
            finite_or(self.image_min_px, defaults.image_min_px),
            finite_or(self.image_max_px, defaults.image_max_px),
        );
        let (table_min_pct, table_max_pct) = ordered(
            finite_or(self.table_min_pct, defaults.table_min_pct),
            finite_or(self.table_max_pct, defaults.table_max_pct),
        );
        let image_default_px = finite_or(self.image_default_px, defaults.image_default_px)
            .clamp(image_min_px, image_max_px);
        Self {
            image_min_px,
            image_max_px,
            image_default_px,
            table_min_pct,
            table_max_pct,
            max_file_bytes: self.max_file_bytes,
        }
    }
}

/// Which command buttons the toolbar shows, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolbarConfig {
    pub items: Vec<String>,
}

impl Default for ToolbarConfig {
    fn default() -> Self {
        Self {
            items: [
                "bold",
                "italic",
                "underline",
                "strikethrough",
                "code",
                "heading",
                "blockquote",
                "bulleted_list",
                "checklist",
                "table",
                "link",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
