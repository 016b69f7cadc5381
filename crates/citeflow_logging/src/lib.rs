//! Shared logging utilities for Citeflow binaries.
//!
//! Every binary logs to two places: a daily-rolling file under
//! `~/.citeflow/logs` (always, no ANSI) and stderr (filtered by verbosity).

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "citeflow=info,citeflow_ingest=info,citeflow_db=info";
const VERBOSE_LOG_FILTER: &str = "citeflow=debug,citeflow_ingest=debug,citeflow_db=debug";
const MAX_LOG_FILES: usize = 7;

/// Logging configuration shared by Citeflow binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror debug output to stderr.
    pub verbose: bool,
    /// Only warnings and errors on stderr (the log file is unaffected).
    pub quiet: bool,
}

/// Keeps the non-blocking file writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(config.app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(&log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.quiet {
        EnvFilter::new("warn")
    } else if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LogGuard { _file: guard })
}

/// Get the Citeflow home directory: ~/.citeflow
///
/// A non-empty `CITEFLOW_HOME` overrides the location; without a home
/// directory `./.citeflow` is used.
pub fn citeflow_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("CITEFLOW_HOME") {
        if !override_path.trim().is_empty() {
            return PathBuf::from(override_path);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".citeflow")
}

/// Get the logs directory: ~/.citeflow/logs
pub fn logs_dir() -> PathBuf {
    citeflow_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name_replaces_separators() {
        assert_eq!(sanitize_name("citeflow"), "citeflow");
        assert_eq!(sanitize_name("cite flow/ingest"), "cite_flow_ingest");
        assert_eq!(sanitize_name("a.b"), "a_b");
    }

    #[test]
    fn test_logs_dir_is_under_home() {
        let logs = logs_dir();
        assert!(logs.ends_with("logs"));
        assert_eq!(logs.parent(), Some(citeflow_home().as_path()));
    }
}
