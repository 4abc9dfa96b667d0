//! Lintel CLI - binary entry point.
//!
//! Acts as both document provider and presentation layer for the lint core:
//! files named on the command line become open documents, every lint cycle
//! runs concurrently, and the published diagnostics are printed once all
//! cycles have settled.

mod cli;
mod documents;

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use clap::Parser;
use tokio::task::JoinSet;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lintel_config::LintelConfig;
use lintel_linter::process::TokioProcessRunner;
use lintel_linter::{DocumentProvider, LintManager, LintOutcome, SkipReason};
use lintel_types::DocumentId;

use crate::cli::{Cli, Commands};
use crate::documents::DiskDocuments;

const LOG_FILE_NAME: &str = "lintel.log";

/// Destination for log records. Never stdout, which carries lint output.
enum LogSink {
    File { path: PathBuf, file: fs::File },
    Stderr,
}

/// Directories tried in order for the log file: next to the user config,
/// then under the working directory.
fn log_dirs() -> Vec<PathBuf> {
    let beside_config = LintelConfig::path()
        .and_then(|config| config.parent().map(|dir| dir.join("logs")));
    beside_config
        .into_iter()
        .chain(std::iter::once(PathBuf::from(".lintel").join("logs")))
        .collect()
}

/// First log directory that accepts an appendable `lintel.log`, plus the
/// reasons earlier directories were passed over.
fn pick_log_sink(dirs: &[PathBuf]) -> (LogSink, Vec<String>) {
    let mut skipped = Vec::new();
    for dir in dirs {
        let path = dir.join(LOG_FILE_NAME);
        let opened = fs::create_dir_all(dir)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(&path));
        match opened {
            Ok(file) => return (LogSink::File { path, file }, skipped),
            Err(e) => skipped.push(format!("cannot log to {}: {e}", path.display())),
        }
    }
    (LogSink::Stderr, skipped)
}

fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (sink, skipped) = pick_log_sink(&log_dirs());
    let registry = tracing_subscriber::registry().with(filter);
    match sink {
        LogSink::File { path, file } => {
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
            tracing::debug!(path = %path.display(), "Logging to file");
        }
        LogSink::Stderr => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
    for reason in skipped {
        tracing::warn!("{reason}");
    }
}

/// Load settings, falling back to defaults when the file is unusable.
fn load_config(path: Option<&Path>) -> (Option<LintelConfig>, Option<String>) {
    let loaded = match path {
        Some(path) => LintelConfig::load_from(path),
        None => LintelConfig::load(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (None, Some(format!("{e}; using default settings"))),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let (config, config_warning) = load_config(cli.config.as_deref());
    init_tracing(config.as_ref().and_then(LintelConfig::log_filter));
    if let Some(warning) = config_warning {
        tracing::warn!("{warning}");
        eprintln!("lintel: {warning}");
    }
    let settings = config.map(LintelConfig::into_settings).unwrap_or_default();

    let documents = Arc::new(DiskDocuments::default());
    let manager = Arc::new(LintManager::new(
        settings,
        Arc::new(TokioProcessRunner),
        Arc::clone(&documents) as Arc<dyn DocumentProvider>,
    ));

    match cli.command {
        Commands::Check { files } => {
            if let Err(e) = manager.activate().await {
                tracing::warn!("{e}");
                eprintln!("lintel: {e}");
            }
            check(&manager, &documents, &files).await
        }
        Commands::Config { file, all } => {
            let found = manager.config_files(&file, all);
            print_paths(&file, &found, "config")
        }
        Commands::Ignore { file } => {
            let found: Vec<PathBuf> = manager.ignore_file(&file).into_iter().collect();
            print_paths(&file, &found, "ignore")
        }
    }
}

async fn check(
    manager: &Arc<LintManager>,
    documents: &DiskDocuments,
    files: &[PathBuf],
) -> Result<ExitCode> {
    let mut opened: Vec<(DocumentId, PathBuf)> = Vec::with_capacity(files.len());
    for file in files {
        opened.push(documents.open(file)?);
    }

    let mut cycles = JoinSet::new();
    for (id, path) in &opened {
        let manager = Arc::clone(manager);
        let id = id.clone();
        let path = path.clone();
        cycles.spawn(async move {
            let outcome = manager.lint_document(&id).await;
            (path, outcome)
        });
    }

    while let Some(joined) = cycles.join_next().await {
        let (path, outcome) = joined?;
        tracing::debug!(path = %path.display(), ?outcome, "Lint cycle finished");
        if let LintOutcome::Skipped(SkipReason::UnsupportedSyntax) = outcome {
            eprintln!("lintel: skipped {} (unsupported file type)", path.display());
        }
    }
    manager.poll_events(usize::MAX);

    for (id, path) in &opened {
        for diagnostic in manager.diagnostics(id).unwrap_or_default() {
            println!("{}", diagnostic.display_with_path(path));
        }
    }

    let snapshot = manager.snapshot();
    if !snapshot.is_empty() {
        eprintln!("{}", snapshot.status_string());
    }
    if snapshot.error_count() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_paths(file: &Path, found: &[PathBuf], kind: &str) -> Result<ExitCode> {
    if found.is_empty() {
        eprintln!("lintel: no {kind} file found for {}", file.display());
        return Ok(ExitCode::FAILURE);
    }
    for path in found {
        println!("{}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lintel_types::LintSettings;

    #[test]
    fn log_dirs_end_with_working_directory() {
        assert_eq!(log_dirs().last(), Some(&PathBuf::from(".lintel").join("logs")));
    }

    #[test]
    fn log_sink_skips_unusable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let usable = dir.path().join("logs");

        let (sink, skipped) = pick_log_sink(&[blocker.join("logs"), usable.clone()]);
        assert_eq!(skipped.len(), 1);
        match sink {
            LogSink::File { path, .. } => assert_eq!(path, usable.join(LOG_FILE_NAME)),
            LogSink::Stderr => panic!("expected a log file"),
        }
    }

    #[test]
    fn log_sink_falls_back_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let (sink, skipped) = pick_log_sink(&[blocker.join("logs")]);
        assert!(matches!(sink, LogSink::Stderr));
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn unusable_config_falls_back_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[lookup\n").unwrap();

        let (config, warning) = load_config(Some(&path));
        assert!(config.is_none());
        assert!(warning.unwrap().contains("using default settings"));
        let settings: LintSettings = config.map(LintelConfig::into_settings).unwrap_or_default();
        assert_eq!(settings.linter.package(), "eslint");
    }

    #[test]
    fn missing_explicit_config_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warning) = load_config(Some(&dir.path().join("absent.toml")));
        assert!(config.is_none());
        assert!(warning.is_none());
    }

    #[test]
    fn print_paths_fails_when_nothing_found() {
        assert_eq!(
            print_paths(Path::new("a.js"), &[], "config").unwrap(),
            ExitCode::FAILURE
        );
    }
}
