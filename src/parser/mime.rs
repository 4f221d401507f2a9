//! MIME body extraction: depth-first part traversal and charset decoding.

use mail_parser::{Encoding, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::debug;

use crate::error::{MailTextError, Result};

/// Maximum depth for recursive multipart descent (adversarial input guard).
const MAX_DEPTH: usize = 10;

/// How to treat payload bytes that are not valid in their declared charset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharsetPolicy {
    /// Substitute U+FFFD for undecodable sequences.
    #[default]
    Replace,
    /// Fail the message with [`MailTextError::UndecodablePayload`].
    Strict,
}

/// Plain text collected from a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyText {
    /// All `text/plain` leaves concatenated in traversal order, no separator.
    pub text: String,
    /// Leaves with `Content-Disposition: attachment` that were skipped.
    pub attachments: usize,
}

/// Parse a complete message (headers + body) and collect its plain-text body.
///
/// A single-part message contributes its whole payload whatever its type.
/// A multipart message (or an encapsulated `message/rfc822`) contributes
/// every `text/plain` leaf; attachment leaves are counted and everything
/// else is skipped.
pub fn extract_body_text(message_bytes: &[u8], policy: CharsetPolicy) -> Result<BodyText> {
    let parser = MessageParser::default();
    let msg = parser.parse(message_bytes).ok_or_else(|| {
        MailTextError::MalformedMessage("MIME structure could not be parsed".into())
    })?;

    let root = msg
        .parts
        .first()
        .ok_or_else(|| MailTextError::MalformedMessage("message has no body part".into()))?;

    let mut body = BodyText::default();
    match &root.body {
        PartType::Multipart(_) | PartType::Message(_) => walk(&msg, 0, 0, policy, &mut body)?,
        _ => body.text.push_str(&decode_part(&msg, root, policy)?),
    }
    Ok(body)
}

/// Depth-first traversal of the part tree rooted at `part_id`.
///
/// Encapsulated messages are descended into after their own part is classified.
fn walk(
    msg: &Message<'_>,
    part_id: usize,
    depth: usize,
    policy: CharsetPolicy,
    body: &mut BodyText,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(MailTextError::MalformedMessage(format!(
            "multipart nesting deeper than {MAX_DEPTH} levels"
        )));
    }
    let Some(part) = msg.parts.get(part_id) else {
        return Err(MailTextError::MalformedMessage(format!(
            "dangling MIME part reference {part_id}"
        )));
    };

    match &part.body {
        PartType::Multipart(children) => {
            for &child in children {
                walk(msg, child as usize, depth + 1, policy, body)?;
            }
        }
        PartType::Message(inner) => {
            if is_attachment(part) {
                debug!(part = part_id, "Encapsulated message sent as attachment");
                body.attachments += 1;
            }
            walk(inner, 0, depth + 1, policy, body)?;
        }
        _ if is_text_plain(part) => body.text.push_str(&decode_part(msg, part, policy)?),
        _ if is_attachment(part) => {
            debug!(part = part_id, "Skipping attachment part");
            body.attachments += 1;
        }
        _ => debug!(part = part_id, mime = %mime_type(part), "Skipping non-text part"),
    }
    Ok(())
}

/// Lowercase `type/subtype` of a part; parts without a Content-Type are `text/plain`.
fn mime_type(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| {
            let main = ct.ctype();
            match ct.subtype() {
                Some(sub) => format!("{main}/{sub}"),
                None => main.to_string(),
            }
        })
        .unwrap_or_else(|| "text/plain".to_string())
        .to_ascii_lowercase()
}

fn is_text_plain(part: &MessagePart<'_>) -> bool {
    mime_type(part) == "text/plain"
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .map(|d| d.ctype().eq_ignore_ascii_case("attachment"))
        .unwrap_or(false)
}

/// Decode the payload of a leaf part of `msg` into text using its declared charset.
///
/// mail-parser already decodes the transfer encoding, and for `text/*`
/// parts the charset too; other payloads arrive as bytes and are decoded here.
fn decode_part(msg: &Message<'_>, part: &MessagePart<'_>, policy: CharsetPolicy) -> Result<String> {
    let charset = part
        .content_type()
        .and_then(|ct| ct.attribute("charset"))
        .unwrap_or("utf-8");

    if policy == CharsetPolicy::Strict && part.is_encoding_problem {
        return Err(MailTextError::UndecodablePayload {
            charset: charset.to_string(),
        });
    }

    match &part.body {
        PartType::Text(text) | PartType::Html(text) => {
            if policy == CharsetPolicy::Strict {
                check_raw_text(msg, part, charset)?;
            }
            Ok(text.to_string())
        }
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            decode_payload(charset, bytes, policy)
        }
        PartType::Message(_) | PartType::Multipart(_) => Ok(String::new()),
    }
}

/// Validate the undecoded bytes of a 7bit/8bit/binary text part against its charset.
///
/// Quoted-printable and base64 payloads are only checked through
/// `is_encoding_problem`.
fn check_raw_text(msg: &Message<'_>, part: &MessagePart<'_>, charset: &str) -> Result<()> {
    if part.encoding != Encoding::None {
        return Ok(());
    }
    match msg
        .raw_message
        .get(part.raw_body_offset()..part.raw_end_offset())
    {
        Some(raw) => decode_payload(charset, raw, CharsetPolicy::Strict).map(|_| ()),
        None => Ok(()),
    }
}

/// Decode bytes with a charset label. Unknown labels decode as UTF-8.
pub fn decode_payload(charset: &str, bytes: &[u8], policy: CharsetPolicy) -> Result<String> {
    let encoding =
        encoding_rs::Encoding::for_label(charset.trim().as_bytes()).unwrap_or(encoding_rs::UTF_8);

    match policy {
        CharsetPolicy::Replace => Ok(encoding
            .decode_without_bom_handling(bytes)
            .0
            .into_owned()),
        CharsetPolicy::Strict => encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.into_owned())
            .ok_or_else(|| MailTextError::UndecodablePayload {
                charset: encoding.name().to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crlf(s: &str) -> Vec<u8> {
        s.replace('\n', "\r\n").into_bytes()
    }

    #[test]
    fn test_single_part_body() {
        let raw = crlf("Subject: Hi\nContent-Type: text/plain; charset=utf-8\n\nHello, world!");
        let body = extract_body_text(&raw, CharsetPolicy::Replace).unwrap();
        assert_eq!(body.text, "Hello, world!");
        assert_eq!(body.attachments, 0);
    }

    #[test]
    fn test_multipart_concatenates_plain_parts() {
        let raw = crlf(
            "Subject: Parts\n\
             MIME-Version: 1.0\n\
             Content-Type: multipart/mixed; boundary=\"XX\"\n\
             \n\
             --XX\n\
             Content-Type: text/plain\n\
             \n\
             A\n\
             --XX\n\
             Content-Type: text/html\n\
             \n\
             <p>skip</p>\n\
             --XX\n\
             Content-Type: text/plain\n\
             \n\
             B\n\
             --XX--\n",
        );
        let body = extract_body_text(&raw, CharsetPolicy::Replace).unwrap();
        assert_eq!(body.text, "AB");
    }

    #[test]
    fn test_multipart_counts_attachments() {
        let raw = crlf(
            "Subject: Files\n\
             Content-Type: multipart/mixed; boundary=\"XX\"\n\
             \n\
             --XX\n\
             Content-Type: text/plain\n\
             \n\
             Body text\n\
             --XX\n\
             Content-Type: application/pdf\n\
             Content-Disposition: attachment; filename=\"a.pdf\"\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             U0VDUkVUUEFZTE9BRA==\n\
             --XX--\n",
        );
        let body = extract_body_text(&raw, CharsetPolicy::Replace).unwrap();
        assert_eq!(body.text, "Body text");
        assert_eq!(body.attachments, 1);
        assert!(!body.text.contains("SECRETPAYLOAD"));
    }

    #[test]
    fn test_inline_image_is_neither_text_nor_attachment() {
        let raw = crlf(
            "Subject: Inline\n\
             Content-Type: multipart/related; boundary=\"XX\"\n\
             \n\
             --XX\n\
             Content-Type: text/plain\n\
             \n\
             Hi\n\
             --XX\n\
             Content-Type: image/png\n\
             Content-Disposition: inline\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             iVBORw0KGgo=\n\
             --XX--\n",
        );
        let body = extract_body_text(&raw, CharsetPolicy::Replace).unwrap();
        assert_eq!(body.text, "Hi");
        assert_eq!(body.attachments, 0);
    }

    /// `levels` nested multipart containers around a single text/plain leaf.
    fn nested_multipart(levels: usize) -> Vec<u8> {
        let mut raw = String::from("Subject: Deep\r\n");
        for i in 0..levels {
            raw.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=\"b{i}\"\r\n\r\n--b{i}\r\n"
            ));
        }
        raw.push_str("Content-Type: text/plain\r\n\r\ndeep\r\n");
        for i in (0..levels).rev() {
            raw.push_str(&format!("--b{i}--\r\n"));
        }
        raw.into_bytes()
    }

    #[test]
    fn test_shallow_nesting_reaches_leaf() {
        let body = extract_body_text(&nested_multipart(3), CharsetPolicy::Replace).unwrap();
        assert_eq!(body.text.trim_end(), "deep");
    }

    #[test]
    fn test_nesting_beyond_limit_is_malformed() {
        let err = extract_body_text(&nested_multipart(14), CharsetPolicy::Replace).unwrap_err();
        assert!(matches!(err, MailTextError::MalformedMessage(_)), "{err:?}");
    }

    #[test]
    fn test_encapsulated_message_text_is_collected() {
        let raw = crlf(
            "Subject: Fwd\n\
             Content-Type: multipart/mixed; boundary=\"XX\"\n\
             \n\
             --XX\n\
             Content-Type: text/plain\n\
             \n\
             Outer\n\
             --XX\n\
             Content-Type: message/rfc822\n\
             Content-Disposition: attachment; filename=\"orig.eml\"\n\
             \n\
             Subject: Original\n\
             Content-Type: text/plain\n\
             \n\
             Inner body\n\
             --XX--\n",
        );
        let body = extract_body_text(&raw, CharsetPolicy::Replace).unwrap();
        assert_eq!(body.text, "OuterInner body");
        assert_eq!(body.attachments, 1);
    }

    #[test]
    fn test_strict_accepts_literal_replacement_character() {
        let raw = "Subject: Marker\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nkeep \u{FFFD} as is"
            .as_bytes();
        let body = extract_body_text(raw, CharsetPolicy::Strict).unwrap();
        assert_eq!(body.text, "keep \u{FFFD} as is");
    }

    #[test]
    fn test_strict_accepts_quoted_printable_replacement_character() {
        let raw = crlf(
            "Subject: Marker\n\
             Content-Type: text/plain; charset=utf-8\n\
             Content-Transfer-Encoding: quoted-printable\n\
             \n\
             a=EF=BF=BDb",
        );
        let body = extract_body_text(&raw, CharsetPolicy::Strict).unwrap();
        assert_eq!(body.text, "a\u{FFFD}b");
    }

    #[test]
    fn test_strict_rejects_raw_invalid_bytes() {
        let raw = b"Subject: Bad\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nbad \xff byte";
        let err = extract_body_text(raw, CharsetPolicy::Strict).unwrap_err();
        assert!(matches!(err, MailTextError::UndecodablePayload { .. }), "{err:?}");
    }

    #[test]
    fn test_decode_payload_latin1() {
        let text = decode_payload("iso-8859-1", b"caf\xe9", CharsetPolicy::Strict).unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn test_decode_payload_unknown_charset_is_utf8() {
        let text = decode_payload("x-made-up", "naïve".as_bytes(), CharsetPolicy::Strict).unwrap();
        assert_eq!(text, "naïve");
    }

    #[test]
    fn test_decode_payload_strict_rejects_invalid_utf8() {
        let err = decode_payload("utf-8", b"bad \xff byte", CharsetPolicy::Strict).unwrap_err();
        assert!(matches!(err, MailTextError::UndecodablePayload { .. }));
    }

    #[test]
    fn test_decode_payload_replace_is_lossy() {
        let text = decode_payload("utf-8", b"bad \xff byte", CharsetPolicy::Replace).unwrap();
        assert_eq!(text, "bad \u{FFFD} byte");
    }
}
