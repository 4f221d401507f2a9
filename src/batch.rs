//! Batch conversion: source listing, intermediate directory preparation,
//! per-message extraction with error isolation, and the final merge.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{Config, RunPaths};
use crate::error::{MailTextError, Result};
use crate::export::merge::{has_extension, merge_text_files};
use crate::export::text::{text_file_name, write_text_document};
use crate::model::report::{BatchReport, Failure};
use crate::parser::eml::{extract_file, ExtractOptions};

/// Choice offered when the intermediate directory already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingDirAction {
    /// Remove the directory and everything in it, then start fresh.
    DeleteAndRestart,
    /// Keep existing documents; same-named ones are overwritten and the rest are merged too.
    ContinueMerging,
    /// Stop the run.
    Abort,
}

/// Settings for one batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub extract: ExtractOptions,
    pub message_extension: String,
    pub text_extension: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            extract: ExtractOptions {
                charset_policy: config.conversion.charset_policy,
            },
            message_extension: config.conversion.message_extension.clone(),
            text_extension: config.conversion.text_extension.clone(),
        }
    }
}

/// Progress callbacks for [`run`].
pub struct Hooks<'a> {
    /// `(current, total)` after each message.
    pub extract_progress: &'a dyn Fn(usize, usize),
    /// Called once the text folder is ready, with the action taken on an existing one.
    pub text_dir_ready: &'a dyn Fn(&Path, Option<ExistingDirAction>),
    /// `(current, total, path)` after each merged document.
    pub merge_progress: &'a dyn Fn(usize, usize, &Path),
}

/// Make sure `dir` exists, consulting `decide` if it already does.
///
/// Returns the action that was carried out, or `None` when the folder was new.
pub fn prepare_text_dir(
    dir: &Path,
    decide: &mut dyn FnMut(&Path) -> Result<ExistingDirAction>,
) -> Result<Option<ExistingDirAction>> {
    let mut taken = None;
    if dir.exists() {
        let action = decide(dir)?;
        match action {
            ExistingDirAction::DeleteAndRestart => {
                std::fs::remove_dir_all(dir).map_err(|e| MailTextError::io(dir, e))?;
                info!(dir = %dir.display(), "Deleted existing text folder");
            }
            ExistingDirAction::ContinueMerging => {
                info!(dir = %dir.display(), "Keeping existing text folder");
            }
            ExistingDirAction::Abort => return Err(MailTextError::Cancelled),
        }
        taken = Some(action);
    }
    std::fs::create_dir_all(dir).map_err(|e| MailTextError::io(dir, e))?;
    Ok(taken)
}

/// List the message files of `dir` (case-insensitive extension), sorted by name.
pub fn list_message_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(MailTextError::MissingDirectory(dir.to_path_buf()));
    }
    let read_dir = std::fs::read_dir(dir).map_err(|e| MailTextError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in read_dir {
        let path = entry.map_err(|e| MailTextError::io(dir, e))?.path();
        if path.is_file() && has_extension(&path, ext) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Convert each message into a text document inside `text_dir`.
///
/// Malformed or undecodable messages are recorded in the report and skipped,
/// as is a message whose text file name was already produced in this batch
/// (`a.eml` and `a.EML`). Any other error aborts the batch.
pub fn convert_folder(
    messages: &[PathBuf],
    text_dir: &Path,
    opts: &BatchOptions,
    progress: &dyn Fn(usize, usize),
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    let mut written: HashSet<String> = HashSet::new();
    let total = messages.len();

    for (idx, message) in messages.iter().enumerate() {
        let name = message
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match extract_file(message, &opts.extract) {
            Ok(extraction) => {
                let file_name = text_file_name(message, &opts.text_extension)?;
                if !written.insert(file_name.clone()) {
                    warn!(
                        file = %name,
                        target = %file_name,
                        "Text file name already used, skipping message"
                    );
                    report.failures.push(Failure {
                        file: name,
                        error: format!("text file '{file_name}' already written for another message"),
                    });
                    progress(idx + 1, total);
                    continue;
                }
                let path = write_text_document(&extraction.document, text_dir, &file_name)?;
                if extraction.attachments_ignored {
                    report.with_attachments.push(name);
                }
                report.converted.push(path);
            }
            Err(e) if e.is_per_message() => {
                warn!(file = %name, error = %e, "Skipping message");
                report.failures.push(Failure {
                    file: name,
                    error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
        progress(idx + 1, total);
    }

    Ok(report)
}

/// Full pipeline: list sources, prepare the text folder, convert, merge.
pub fn run(
    paths: &RunPaths,
    opts: &BatchOptions,
    decide: &mut dyn FnMut(&Path) -> Result<ExistingDirAction>,
    hooks: &Hooks<'_>,
) -> Result<BatchReport> {
    let messages = list_message_files(&paths.source_dir, &opts.message_extension)?;
    info!(
        count = messages.len(),
        dir = %paths.source_dir.display(),
        "Found messages"
    );

    let action = prepare_text_dir(&paths.text_dir, decide)?;
    (hooks.text_dir_ready)(&paths.text_dir, action);

    let mut report = convert_folder(
        &messages,
        &paths.text_dir,
        opts,
        hooks.extract_progress,
    )?;

    let stats = merge_text_files(
        &paths.text_dir,
        &paths.output_file,
        &opts.text_extension,
        hooks.merge_progress,
    )?;
    report.merge = Some(stats);

    if report.has_failures() {
        warn!(
            failed = report.failures.len(),
            converted = report.converted.len(),
            "Some messages could not be converted"
        );
    }
    Ok(report)
}
