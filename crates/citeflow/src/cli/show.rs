//! Show command - print the stored record for one identifier

use crate::cli::error::HelpfulError;
use crate::cli::output::format_millis;
use crate::cli::{current_thread_runtime, database_path, open_existing_db};
use anyhow::{Context, Result};
use citeflow_ingest::IngestConfig;
use std::path::PathBuf;

/// Arguments for the show command
#[derive(Debug)]
pub struct ShowArgs {
    pub identifier: String,
    pub db: Option<PathBuf>,
}

pub fn run(args: ShowArgs) -> Result<()> {
    let config = IngestConfig::resolve(None).context("Failed to load config")?;
    let db_path = database_path(args.db, &config);

    let rt = current_thread_runtime()?;
    let row = rt.block_on(async {
        let db = open_existing_db(&db_path).await?;
        let row = db.citation_get(&args.identifier).await?;
        anyhow::Ok(row)
    })?;

    let Some(row) = row else {
        return Err(HelpfulError::record_not_found(&args.identifier).into());
    };

    let record: serde_json::Value = serde_json::from_str(&row.record_json)
        .with_context(|| format!("Stored record for '{}' is not valid JSON", row.pmid))?;

    eprintln!(
        "{} v{} from {} ({}, updated {})",
        row.pmid,
        row.version,
        row.source_file,
        row.schema_tag,
        format_millis(row.updated_at)
    );
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
