//! Centralized error types for mailtext.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailtext library.
#[derive(Error, Debug)]
pub enum MailTextError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A directory the run depends on does not exist.
    #[error("Directory not found: {0}")]
    MissingDirectory(PathBuf),

    /// The raw message cannot be parsed as an RFC 5322 / MIME message.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A body part could not be decoded with its declared charset.
    #[error("Payload is not valid {charset}")]
    UndecodablePayload { charset: String },

    /// The user chose to abort instead of touching an existing directory.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// An invalid path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, MailTextError>`.
pub type Result<T> = std::result::Result<T, MailTextError>;

impl MailTextError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors confined to a single message.
    ///
    /// A batch records these and moves on; everything else aborts the run.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage(_) | Self::UndecodablePayload { .. }
        )
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `MailTextError::io`).
impl From<std::io::Error> for MailTextError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
