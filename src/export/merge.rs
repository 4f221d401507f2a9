//! Merge every text document of the intermediate directory into one file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{MailTextError, Result};
use crate::model::report::MergeStats;

/// Merge the `*.<text_ext>` files of `text_dir` into `output`.
///
/// Each document is framed as
/// `"\n--- START: <name> ---\n" <content> "\n--- END: <name> ---\n\n"`.
/// Files are merged in lexicographic name order and streamed one at a time.
///
/// The progress callback receives `(current, total, path)` after each file.
pub fn merge_text_files(
    text_dir: &Path,
    output: &Path,
    text_ext: &str,
    progress: &dyn Fn(usize, usize, &Path),
) -> Result<MergeStats> {
    let inputs = list_text_files(text_dir, text_ext, output)?;

    let out_file = File::create(output).map_err(|e| MailTextError::io(output, e))?;
    let mut out = BufWriter::new(out_file);
    let total = inputs.len();

    for (idx, input) in inputs.iter().enumerate() {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let write_err = |e| MailTextError::io(output, e);
        write!(out, "\n--- START: {name} ---\n").map_err(write_err)?;
        let mut in_file = File::open(input).map_err(|e| MailTextError::io(input, e))?;
        std::io::copy(&mut in_file, &mut out).map_err(|e| MailTextError::io(input, e))?;
        write!(out, "\n--- END: {name} ---\n\n").map_err(write_err)?;

        info!("Processed {}", input.display());
        progress(idx + 1, total, input);
    }

    out.flush().map_err(|e| MailTextError::io(output, e))?;
    drop(out);

    let output_size = std::fs::metadata(output)
        .map_err(|e| MailTextError::io(output, e))?
        .len();

    Ok(MergeStats {
        documents: total,
        output_size,
    })
}

/// List the files to merge, sorted by name.
///
/// The output file is never listed, even when it lives inside `text_dir`.
fn list_text_files(text_dir: &Path, text_ext: &str, output: &Path) -> Result<Vec<PathBuf>> {
    if !text_dir.is_dir() {
        return Err(MailTextError::MissingDirectory(text_dir.to_path_buf()));
    }
    let read_dir = std::fs::read_dir(text_dir).map_err(|e| MailTextError::io(text_dir, e))?;
    let output_canonical = output.canonicalize().ok();

    let mut files = Vec::new();
    for entry in read_dir {
        let path = entry.map_err(|e| MailTextError::io(text_dir, e))?.path();
        if !path.is_file() || !has_extension(&path, text_ext) {
            continue;
        }
        if output_canonical.is_some() && path.canonicalize().ok() == output_canonical {
            debug!(path = %path.display(), "Skipping merge output");
            continue;
        }
        files.push(path);
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Case-insensitive extension check.
pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_progress(_: usize, _: usize, _: &Path) {}

    #[test]
    fn test_merge_framing_and_order() {
        let tmp = tempfile::tempdir().unwrap();
        let text_dir = tmp.path().join("text");
        std::fs::create_dir(&text_dir).unwrap();
        std::fs::write(text_dir.join("b.txt"), "Y").unwrap();
        std::fs::write(text_dir.join("a.txt"), "X").unwrap();
        std::fs::write(text_dir.join("notes.md"), "ignored").unwrap();
        let output = tmp.path().join("output.txt");

        let stats = merge_text_files(&text_dir, &output, "txt", &no_progress).unwrap();
        assert_eq!(stats.documents, 2);

        let merged = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            merged,
            "\n--- START: a.txt ---\nX\n--- END: a.txt ---\n\n\
             \n--- START: b.txt ---\nY\n--- END: b.txt ---\n\n"
        );
        assert_eq!(stats.output_size, merged.len() as u64);
    }

    #[test]
    fn test_merge_empty_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("out.txt");
        let text_dir = tmp.path().join("text");
        std::fs::create_dir(&text_dir).unwrap();

        let stats = merge_text_files(&text_dir, &output, "txt", &no_progress).unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(std::fs::read(&output).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_merge_skips_its_own_output() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "X").unwrap();
        let output = tmp.path().join("merged.txt");
        std::fs::write(&output, "stale").unwrap();

        let stats = merge_text_files(tmp.path(), &output, "txt", &no_progress).unwrap();
        assert_eq!(stats.documents, 1);
        let merged = std::fs::read_to_string(&output).unwrap();
        assert!(!merged.contains("stale"));
        assert!(!merged.contains("merged.txt"));
    }

    #[test]
    fn test_merge_missing_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = merge_text_files(
            &tmp.path().join("absent"),
            &tmp.path().join("out.txt"),
            "txt",
            &no_progress,
        )
        .unwrap_err();
        assert!(matches!(err, MailTextError::MissingDirectory(_)));
        assert!(!err.is_per_message());
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        assert!(has_extension(Path::new("A.TXT"), "txt"));
        assert!(!has_extension(Path::new("a.txt.bak"), "txt"));
        assert!(!has_extension(Path::new("txt"), "txt"));
    }
}
