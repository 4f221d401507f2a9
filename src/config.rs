//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILTEXT_CONFIG` (environment variable)
//! 2. `~/.config/mailtext/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailtext\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::ExistingDirAction;
use crate::parser::mime::CharsetPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Input, intermediate, and output locations.
    pub paths: PathsConfig,
    /// Extraction settings.
    pub conversion: ConversionConfig,
}

/// What to do when the intermediate directory already exists.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OnExisting {
    /// Ask interactively.
    #[default]
    Ask,
    /// Delete it and start fresh.
    Delete,
    /// Keep it and write into it.
    Continue,
    /// Stop without touching anything.
    Abort,
}

impl OnExisting {
    /// The fixed action for non-interactive modes; `None` for [`OnExisting::Ask`].
    pub fn action(self) -> Option<ExistingDirAction> {
        match self {
            Self::Ask => None,
            Self::Delete => Some(ExistingDirAction::DeleteAndRestart),
            Self::Continue => Some(ExistingDirAction::ContinueMerging),
            Self::Abort => Some(ExistingDirAction::Abort),
        }
    }
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub cache_dir: Option<PathBuf>,
    /// Policy for an existing intermediate directory.
    pub on_existing: OnExisting,
}

/// Locations. Relative paths are resolved against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Folder holding the `.eml` files.
    pub source_dir: PathBuf,
    /// Intermediate folder, one text document per message.
    pub text_dir: PathBuf,
    /// Merged output file.
    pub output_file: PathBuf,
}

/// Extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Extension of source messages (without the dot).
    pub message_extension: String,
    /// Extension of text documents (without the dot).
    pub text_extension: String,
    /// Handling of payloads invalid in their declared charset.
    pub charset_policy: CharsetPolicy,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            on_existing: OnExisting::Ask,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("samples"),
            text_dir: PathBuf::from("text"),
            output_file: PathBuf::from("output.txt"),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            message_extension: "eml".to_string(),
            text_extension: "txt".to_string(),
            charset_policy: CharsetPolicy::Replace,
        }
    }
}

// ── Resolved paths ──────────────────────────────────────────────

/// Absolute locations for one run, built once at startup and passed down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub source_dir: PathBuf,
    pub text_dir: PathBuf,
    pub output_file: PathBuf,
}

impl Config {
    /// Resolve configured paths against `cwd`. `source` overrides the source folder.
    pub fn resolve(&self, cwd: &Path, source: Option<&Path>) -> RunPaths {
        let source_dir = source.unwrap_or(self.paths.source_dir.as_path());
        RunPaths {
            source_dir: cwd.join(source_dir),
            text_dir: cwd.join(&self.paths.text_dir),
            output_file: cwd.join(&self.paths.output_file),
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            return load_config_from(&path);
        }
    }
    Config::default()
}

/// Load configuration from an explicit file, falling back to defaults on error.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILTEXT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailtext").join("config.toml"))
}

/// Return the cache directory used for the log file.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtext")
}
