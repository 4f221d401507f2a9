//! RFC 5322 header parsing: field validation, folding, and encoded-words (RFC 2047).

use tracing::warn;

use crate::error::{MailTextError, Result};
use crate::model::document::HeaderSet;

/// Build a [`HeaderSet`] from the raw header block of a message.
///
/// Only the four recognized headers are kept. The first occurrence of each wins.
pub fn parse_header_set(raw_headers: &[u8]) -> Result<HeaderSet> {
    let text = decode_header_bytes(raw_headers);
    let fields = parse_header_fields(&text)?;

    let value = |name: &str| get_header(&fields, name).map(|v| decode_encoded_words(&v));

    Ok(HeaderSet {
        from: value("from"),
        to: value("to"),
        subject: value("subject"),
        date: value("date"),
    })
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Split a header block into `(lowercase_name, value)` pairs, unfolding continuation lines.
///
/// Fails on a continuation line with nothing to continue, on a line that is
/// not a field, on an invalid field name, and on a block without any field.
fn parse_header_fields(text: &str) -> Result<Vec<(String, String)>> {
    let mut result: Vec<(String, String)> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if line.starts_with(' ') || line.starts_with('\t') {
            let Some(last) = result.last_mut() else {
                return Err(MailTextError::MalformedMessage(
                    "continuation line before the first header field".into(),
                ));
            };
            last.1.push(' ');
            last.1.push_str(line.trim());
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim_end();
            if !is_field_name(name) {
                return Err(MailTextError::MalformedMessage(format!(
                    "invalid header field name on line {}",
                    idx + 1
                )));
            }
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name.to_ascii_lowercase(), value));
        } else {
            return Err(MailTextError::MalformedMessage(format!(
                "header line {} is not a field",
                idx + 1
            )));
        }
    }

    if result.is_empty() {
        return Err(MailTextError::MalformedMessage(
            "no header fields found".into(),
        ));
    }
    Ok(result)
}

/// RFC 5322 §2.2: printable US-ASCII except the colon.
fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

/// Get the first value for a header name (case-insensitive).
fn get_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &remaining[start + 2 + decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(encoded_text.as_bytes()),
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 language suffix: "UTF-8*en"
    let charset = charset.split('*').next().unwrap_or(charset);
    let text = decode_charset(charset, &bytes);

    Some(DecodedWord {
        text,
        consumed: total_consumed,
    })
}

/// Minimal base64 decoder for encoded-words. Whitespace is skipped, padding optional.
fn decode_base64(input: &[u8]) -> Vec<u8> {
    fn b64val(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut acc: u32 = 0;
    let mut bits = 0u8;
    for &c in input {
        if c == b'=' {
            break;
        }
        let Some(v) = b64val(c) else { continue };
        acc = (acc << 6) | u32::from(v);
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }
    out
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    result.push(byte);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}
