//! Message extractor for individual `.eml` files (RFC 5322 messages without MBOX framing).

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{MailTextError, Result};
use crate::model::document::{Extraction, TextDocument};
use crate::parser::header;
use crate::parser::mime::{self, CharsetPolicy};

/// Knobs for a single extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub charset_policy: CharsetPolicy,
}

/// Extract the recognized headers and plain-text body of a raw message.
///
/// Attachments are never decoded; their presence is only reported through
/// [`Extraction::attachments_ignored`].
pub fn extract(raw: &[u8], opts: &ExtractOptions) -> Result<Extraction> {
    let message = skip_from_line(raw);
    if message.iter().all(u8::is_ascii_whitespace) {
        return Err(MailTextError::MalformedMessage("message is empty".into()));
    }

    let header_end = find_header_end(message).unwrap_or(message.len());
    let headers = header::parse_header_set(&message[..header_end])?;
    let body = mime::extract_body_text(message, opts.charset_policy)?;

    Ok(Extraction {
        document: TextDocument::new(headers, body.text),
        attachments_ignored: body.attachments > 0,
        attachment_count: body.attachments,
    })
}

/// Read a single `.eml` file and extract it.
///
/// Emits a warning naming the file when attachments were discarded.
pub fn extract_file(path: impl AsRef<Path>, opts: &ExtractOptions) -> Result<Extraction> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| MailTextError::io(path, e))?;

    let extraction = extract(&data, opts)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    if extraction.attachments_ignored {
        warn!(
            file = %name,
            count = extraction.attachment_count,
            "The email '{name}' contains one or more attachments that were ignored"
        );
    }
    debug!(file = %name, body_len = extraction.document.body.len(), "Extracted message");

    Ok(extraction)
}

/// Skip a leading BOM and the `From ` separator line of MBOX-style exports.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    // Look for \n\n or \r\n\r\n
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_header_end() {
        // "From: a@b.com\n" = 14 bytes, "Subject: Hi\n" = 12 bytes
        let data = b"From: a@b.com\nSubject: Hi\n\nBody\n";
        assert_eq!(find_header_end(data), Some(25));
    }

    #[test]
    fn test_find_header_end_crlf() {
        let data = b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n";
        assert_eq!(find_header_end(data), Some(26));
    }

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_keeps_from_header() {
        let data = b"From: user@example.com\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_skip_from_line_strips_bom() {
        let data = b"\xEF\xBB\xBFFrom user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        assert_eq!(skip_from_line(b"\xEF\xBB\xBFSubject: Test\n"), b"Subject: Test\n");
    }

    #[test]
    fn test_extract_with_bom_reads_first_header() {
        let raw = b"\xEF\xBB\xBFFrom: a@example.com\r\n\r\nHi";
        let extraction = extract(raw, &ExtractOptions::default()).unwrap();
        assert_eq!(extraction.document.headers.from.as_deref(), Some("a@example.com"));
        assert_eq!(extraction.document.body, "Hi");
    }

    #[test]
    fn test_extract_renders_document() {
        let raw = b"From: a@example.com\r\nTo: b@example.com\r\nSubject: Hi\r\nDate: Thu, 04 Jan 2024 10:00:00 +0000\r\n\r\nHello, world!";
        let extraction = extract(raw, &ExtractOptions::default()).unwrap();
        assert!(!extraction.attachments_ignored);
        assert_eq!(
            extraction.document.render(),
            "From: a@example.com\nTo: b@example.com\nSubject: Hi\nDate: Thu, 04 Jan 2024 10:00:00 +0000\n\nHello, world!"
        );
    }

    #[test]
    fn test_extract_empty_is_malformed() {
        let err = extract(b"", &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, MailTextError::MalformedMessage(_)));
        let err = extract(b" \r\n", &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, MailTextError::MalformedMessage(_)));
    }

    #[test]
    fn test_extract_garbage_is_malformed() {
        let err = extract(b"just some words\nand more\n\nbody", &ExtractOptions::default())
            .unwrap_err();
        assert!(err.is_per_message());
    }
}
