//! Persist text documents into the intermediate directory.

use std::path::{Path, PathBuf};

use crate::error::{MailTextError, Result};
use crate::model::document::TextDocument;

/// Name of the text document for a source message: `<stem>.<text_ext>`.
pub fn text_file_name(message_path: &Path, text_ext: &str) -> Result<String> {
    let stem = message_path
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            MailTextError::InvalidPath(format!("no file name in {}", message_path.display()))
        })?;
    Ok(format!("{}.{text_ext}", stem.to_string_lossy()))
}

/// Write a document into `dir` as UTF-8, replacing any file of the same name.
pub fn write_text_document(doc: &TextDocument, dir: &Path, file_name: &str) -> Result<PathBuf> {
    let path = dir.join(file_name);
    std::fs::write(&path, doc.render()).map_err(|e| MailTextError::io(&path, e))?;
    Ok(path)
}
