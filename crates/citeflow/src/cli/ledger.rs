//! Ledger command - list fully ingested files

use crate::cli::output::{format_count, format_millis, print_table};
use crate::cli::{current_thread_runtime, database_path, open_existing_db};
use anyhow::{Context, Result};
use citeflow_db::LedgerRow;
use citeflow_ingest::IngestConfig;
use std::path::PathBuf;

/// Arguments for the ledger command
#[derive(Debug)]
pub struct LedgerArgs {
    pub db: Option<PathBuf>,
    pub json: bool,
}

pub fn run(args: LedgerArgs) -> Result<()> {
    let config = IngestConfig::resolve(None).context("Failed to load config")?;
    let db_path = database_path(args.db, &config);

    let rt = current_thread_runtime()?;
    let entries = rt.block_on(async {
        let db = open_existing_db(&db_path).await?;
        let entries = db.ledger_list().await?;
        anyhow::Ok(entries)
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No files ingested yet.");
        return Ok(());
    }

    print_table(&["FILE", "RECORDS", "UPSERTED", "SKIPPED", "COMPLETED"], rows(&entries));
    println!("{} file(s)", entries.len());
    Ok(())
}

fn rows(entries: &[LedgerRow]) -> Vec<Vec<String>> {
    entries
        .iter()
        .map(|e| {
            vec![
                e.file_id.clone(),
                format_count(count(e.records_seen)),
                format_count(count(e.upserted)),
                format_count(count(e.skipped)),
                format_millis(e.completed_at),
            ]
        })
        .collect()
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
