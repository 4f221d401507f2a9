//! Per-message text document: the four recognized headers plus plain-text body.

use std::fmt;

/// Header keys rendered into every document, in this order.
pub const HEADER_KEYS: [&str; 4] = ["From", "To", "Subject", "Date"];

/// Rendered in place of a header the message does not carry.
pub const ABSENT_MARKER: &str = "None";

/// The recognized headers of a single message.
///
/// A missing header is `None` and is rendered as [`ABSENT_MARKER`], never omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct HeaderSet {
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
}

impl HeaderSet {
    /// Look up a value by its display key (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        let slot = match key.to_ascii_lowercase().as_str() {
            "from" => &self.from,
            "to" => &self.to,
            "subject" => &self.subject,
            "date" => &self.date,
            _ => return None,
        };
        slot.as_deref()
    }

    /// `(key, value)` pairs in [`HEADER_KEYS`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> + '_ {
        HEADER_KEYS.iter().map(move |&key| (key, self.get(key)))
    }
}

/// The rendered artifact for one message.
///
/// Layout: one `Key: Value` line per recognized header, a blank line, then
/// the concatenated plain-text body exactly as decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct TextDocument {
    pub headers: HeaderSet,
    pub body: String,
}

impl TextDocument {
    pub fn new(headers: HeaderSet, body: String) -> Self {
        Self { headers, body }
    }

    /// Render the document into its on-disk text form.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .headers
            .iter()
            .map(|(key, value)| format!("{key}: {}", value.unwrap_or(ABSENT_MARKER)))
            .collect();
        write!(f, "{}\n\n{}", lines.join("\n"), self.body)
    }
}

/// Result of extracting one raw message.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: TextDocument,
    /// `true` when at least one attachment part was seen and discarded.
    pub attachments_ignored: bool,
    /// Number of attachment parts discarded.
    pub attachment_count: usize,
}
