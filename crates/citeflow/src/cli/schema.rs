//! Schema command - print the effective record schema as TOML
//!
//! The output is a valid schema file: copy it, edit the fields, and pass
//! it back with `--schema`.

use crate::cli::error::HelpfulError;
use anyhow::{Context, Result};
use citeflow_ingest::{IngestConfig, RecordSchema};
use std::path::PathBuf;

/// Arguments for the schema command
#[derive(Debug)]
pub struct SchemaArgs {
    pub schema: Option<PathBuf>,
}

pub fn run(args: SchemaArgs) -> Result<()> {
    let schema = match &args.schema {
        Some(path) => RecordSchema::load(path)
            .map_err(|err| HelpfulError::invalid_schema(path, &err.to_string()))?,
        None => {
            let config = IngestConfig::resolve(None).context("Failed to load config")?;
            crate::cli::ingest::load_schema(&config)?
        }
    };

    println!(
        "# {}: {} field(s), {} entity group(s)",
        schema.tag(),
        schema.fields.len(),
        schema.entities.len()
    );
    print!("{}", schema.to_toml_string()?);
    Ok(())
}
