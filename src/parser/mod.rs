//! Email parsing: EML extraction, header decoding, and MIME body traversal.

pub mod eml;
pub mod header;
pub mod mime;
