//! CLI entry point for `mailtext`.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use mailtext::batch::{self, BatchOptions, ExistingDirAction, Hooks};
use mailtext::config::{Config, OnExisting};
use mailtext::model::report::BatchReport;
use mailtext::parser::mime::CharsetPolicy;

/// Convert a folder of .eml files into text files and merge them into one.
#[derive(Parser)]
#[command(name = "mailtext", version)]
struct Cli {
    /// Folder containing the .eml files [default: ./samples]
    #[arg(value_name = "SOURCE_DIR")]
    source: Option<PathBuf>,

    /// What to do when the text folder already exists
    #[arg(long, value_enum, value_name = "ACTION", env = "MAILTEXT_ON_EXISTING")]
    on_existing: Option<OnExisting>,

    /// Folder for the per-message text files [default: ./text]
    #[arg(long, value_name = "DIR")]
    text_dir: Option<PathBuf>,

    /// Merged output file [default: ./output.txt]
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Skip messages whose text is not valid in its declared charset
    #[arg(long)]
    strict: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = mailtext::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    if let Some(dir) = cli.text_dir {
        config.paths.text_dir = dir;
    }
    if let Some(output) = cli.output {
        config.paths.output_file = output;
    }
    if cli.strict {
        config.conversion.charset_policy = CharsetPolicy::Strict;
    }
    let on_existing = cli.on_existing.unwrap_or(config.general.on_existing);

    let cwd = std::env::current_dir()?;
    let paths = config.resolve(&cwd, cli.source.as_deref());
    let opts = BatchOptions::from_config(&config);

    let pb = if cli.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let quiet = cli.json;
    let extract_progress = |current: usize, total: usize| {
        pb.set_length(total as u64);
        pb.set_position(current as u64);
    };
    let merge_progress = |_current: usize, _total: usize, path: &Path| {
        if !quiet {
            pb.suspend(|| println!("Processed {}", path.display()));
        }
    };
    let text_dir_ready = |dir: &Path, action: Option<ExistingDirAction>| {
        if !quiet && action == Some(ExistingDirAction::DeleteAndRestart) {
            pb.suspend(|| println!("Deleted the folder '{}'. Starting fresh.", dir.display()));
        }
    };
    let hooks = Hooks {
        extract_progress: &extract_progress,
        text_dir_ready: &text_dir_ready,
        merge_progress: &merge_progress,
    };

    let mut decide = |dir: &Path| match on_existing.action() {
        Some(action) => Ok(action),
        None => pb.suspend(|| ask_on_stdin(dir)),
    };

    let report = batch::run(&paths, &opts, &mut decide, &hooks)?;
    pb.finish_and_clear();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, &paths.output_file, &config);
    }

    Ok(())
}

/// Ask whether to delete an existing text folder. `yes`/`y` deletes, anything else continues.
fn ask_on_stdin(dir: &Path) -> mailtext::error::Result<ExistingDirAction> {
    print!(
        "The output folder '{}' already exists. Do you want to delete it and start fresh? (yes/no): ",
        dir.display()
    );
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;

    match answer.trim().to_lowercase().as_str() {
        "yes" | "y" => Ok(ExistingDirAction::DeleteAndRestart),
        _ => {
            println!(
                "Continuing without deleting the folder. Existing files may be overwritten or included in the merge."
            );
            Ok(ExistingDirAction::ContinueMerging)
        }
    }
}

/// Print the completion line and any per-message failures.
fn print_summary(report: &BatchReport, output: &Path, config: &Config) {
    use humansize::{format_size, BINARY};

    let ext = &config.conversion.message_extension;
    println!(
        "DONE! All .{ext} files have been converted and merged into {}",
        output.display()
    );

    if let Some(stats) = &report.merge {
        println!(
            "  {} document(s), {}",
            stats.documents,
            format_size(stats.output_size, BINARY)
        );
    }
    if !report.with_attachments.is_empty() {
        println!(
            "  {} message(s) had attachments that were ignored",
            report.with_attachments.len()
        );
    }
    if report.has_failures() {
        println!();
        println!("  {} message(s) could not be converted:", report.failures.len());
        for failure in &report.failures {
            println!("    {:<30} {}", failure.file, failure.error);
        }
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailtext::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailtext.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}
