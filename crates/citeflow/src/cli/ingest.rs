//! Ingest command - stream XML containers into the citation store
//!
//! Files are processed in path order; each one is either fully reconciled
//! and added to the ledger, or reported with the reason it was not.

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_count, format_elapsed, outcome_color, print_table_colored};
use anyhow::{Context, Result};
use citeflow::SqliteStore;
use citeflow_ingest::{
    discover_inputs, BatchDriver, BatchReport, CancellationFlag, ConfigError, FileOutcome,
    IngestConfig, IngestError, InputFile, RecordAssembler, RecordSchema, Reconciler,
};
use comfy_table::Color;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Exit code when at least one file failed.
const EXIT_FILE_FAILURES: u8 = 2;
/// Exit code when interrupted before every file was processed.
const EXIT_CANCELLED: u8 = 130;

/// Arguments for the ingest command
#[derive(Debug)]
pub struct IngestArgs {
    pub path: PathBuf,
    pub db: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub schema: Option<PathBuf>,
    pub max_attempts: Option<u32>,
    pub json: bool,
}

pub fn run(args: IngestArgs) -> Result<ExitCode> {
    let config = effective_config(&args)?;
    let schema = Arc::new(load_schema(&config)?);
    let inputs = collect_inputs(&args.path, &config.extensions)?;
    let db_path = PathBuf::from(&config.database_path);

    info!(
        inputs = inputs.len(),
        db = %db_path.display(),
        schema = %schema.tag(),
        "Starting ingest"
    );

    // Multi-threaded so the Ctrl-C listener runs while a file is being walked.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let report = rt.block_on(async {
        let store = Arc::new(
            SqliteStore::open(&db_path, schema.clone())
                .await
                .with_context(|| format!("Failed to open database {}", db_path.display()))?,
        );

        let cancel = CancellationFlag::new();
        let listener = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; stopping after the current record");
                listener.cancel();
            }
        });

        let reconciler = Reconciler::new(store.clone()).with_retry(config.retry_policy());
        let driver = BatchDriver::new(RecordAssembler::new(schema), reconciler, store)
            .with_cancellation(cancel);

        anyhow::Ok(driver.run(&inputs).await)
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(ExitCode::from(exit_status(&report)))
}

/// Config file (explicit, default location, or built-in defaults) with CLI
/// overrides applied.
fn effective_config(args: &IngestArgs) -> Result<IngestConfig> {
    let mut config = IngestConfig::resolve(args.config.as_deref()).map_err(|err| {
        let path = args.config.clone().unwrap_or_else(IngestConfig::default_path);
        match err {
            ConfigError::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                HelpfulError::path_not_found(&path)
            }
            other => HelpfulError::invalid_config(&path, &other.to_string()),
        }
    })?;

    if let Some(db) = &args.db {
        config.database_path = db.display().to_string();
    }
    if let Some(schema) = &args.schema {
        config.schema_path = Some(schema.display().to_string());
    }
    if let Some(max_attempts) = args.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    Ok(config)
}

pub(crate) fn load_schema(config: &IngestConfig) -> Result<RecordSchema> {
    config.load_schema().map_err(|err| {
        let path = config
            .schema_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("<built-in pubmed schema>"));
        HelpfulError::invalid_schema(&path, &err.to_string()).into()
    })
}

fn collect_inputs(path: &Path, extensions: &[String]) -> Result<Vec<InputFile>> {
    let inputs = match discover_inputs(path, extensions) {
        Ok(inputs) => inputs,
        Err(IngestError::NotFound(missing)) => {
            return Err(HelpfulError::path_not_found(&missing).into())
        }
        Err(err) => return Err(err.into()),
    };
    if inputs.is_empty() {
        return Err(HelpfulError::no_inputs(path, extensions).into());
    }
    Ok(inputs)
}

fn exit_status(report: &BatchReport) -> u8 {
    if report.has_failures() {
        EXIT_FILE_FAILURES
    } else if report.count(FileOutcome::Cancelled) > 0 {
        EXIT_CANCELLED
    } else {
        0
    }
}

fn print_report(report: &BatchReport) {
    let rows = report
        .files
        .iter()
        .map(|file| {
            vec![
                (file.file.clone(), None),
                (file.outcome.as_str().to_string(), Some(outcome_color(file.outcome))),
                (format_count(file.records_seen), None),
                (format_count(file.upserted), None),
                (format_count(file.skipped), None),
                (format_count(file.empty_identifier), None),
                (
                    format_count(file.failed),
                    (file.failed > 0).then_some(Color::Red),
                ),
                (format_elapsed(file.elapsed_ms), None),
            ]
        })
        .collect();

    print_table_colored(
        &["FILE", "OUTCOME", "RECORDS", "UPSERTED", "SKIPPED", "NO ID", "FAILED", "TIME"],
        rows,
    );

    println!(
        "{} file(s): {} completed, {} already ingested, {} failed",
        report.files.len(),
        report.count(FileOutcome::Completed),
        report.count(FileOutcome::AlreadyIngested),
        report.files.iter().filter(|f| f.outcome.is_failure()).count(),
    );
    println!(
        "{} records: {} upserted, {} skipped, {} without identifier, {} failed",
        format_count(report.records_seen()),
        format_count(report.upserted()),
        format_count(report.skipped()),
        format_count(report.empty_identifier()),
        format_count(report.failed()),
    );

    for file in &report.files {
        if let Some(error) = &file.error {
            eprintln!("{}: {}", file.file, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeflow_ingest::FileReport;

    fn file(outcome: FileOutcome) -> FileReport {
        FileReport {
            file: "a.xml".to_string(),
            outcome,
            records_seen: 1,
            upserted: 1,
            skipped: 0,
            empty_identifier: 0,
            failed: 0,
            elapsed_ms: 3,
            error: None,
        }
    }

    fn args() -> IngestArgs {
        IngestArgs {
            path: PathBuf::from("."),
            db: Some(PathBuf::from("/tmp/override.sqlite3")),
            config: None,
            schema: None,
            max_attempts: Some(7),
            json: false,
        }
    }

    #[test]
    fn test_exit_code_reflects_outcomes() {
        let ok = BatchReport {
            files: vec![file(FileOutcome::Completed), file(FileOutcome::AlreadyIngested)],
        };
        assert_eq!(exit_status(&ok), 0);

        let failed = BatchReport {
            files: vec![file(FileOutcome::Completed), file(FileOutcome::Corrupt)],
        };
        assert_eq!(exit_status(&failed), EXIT_FILE_FAILURES);

        let cancelled = BatchReport {
            files: vec![file(FileOutcome::Cancelled)],
        };
        assert_eq!(exit_status(&cancelled), EXIT_CANCELLED);
    }

    #[test]
    fn test_cli_flags_override_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            "database_path = \"/tmp/from_config.sqlite3\"\n[retry]\nmax_attempts = 2\n",
        )
        .unwrap();

        let mut args = args();
        args.config = Some(config_path);
        let config = effective_config(&args).unwrap();
        assert_eq!(config.database_path, "/tmp/override.sqlite3");
        assert_eq!(config.retry.max_attempts, 7);
    }

    #[test]
    fn test_missing_config_is_helpful() {
        let mut args = args();
        args.config = Some(PathBuf::from("/nonexistent/citeflow.toml"));
        let err = effective_config(&args).unwrap_err();
        let helpful = err.downcast_ref::<HelpfulError>().unwrap();
        assert!(helpful.message.contains("/nonexistent/citeflow.toml"));
    }

    #[test]
    fn test_empty_directory_has_no_inputs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = collect_inputs(tmp.path(), &["xml".to_string()]).unwrap_err();
        assert!(err.to_string().contains("No input files"));
    }
}
