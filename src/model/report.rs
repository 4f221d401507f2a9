//! Outcome of a batch run.

use std::path::PathBuf;

/// A message that could not be converted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Failure {
    /// File name of the source message.
    pub file: String,
    /// Human-readable reason.
    pub error: String,
}

/// Statistics returned by a merge operation.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MergeStats {
    /// Number of text documents written into the merged file.
    pub documents: usize,
    /// Size of the merged file in bytes.
    pub output_size: u64,
}

/// Summary of one conversion batch.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BatchReport {
    /// Text documents written to the intermediate directory.
    pub converted: Vec<PathBuf>,
    /// Source file names whose attachments were discarded.
    pub with_attachments: Vec<String>,
    /// Messages skipped because they could not be parsed or decoded.
    pub failures: Vec<Failure>,
    /// Filled in once the merge step has run.
    pub merge: Option<MergeStats>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
