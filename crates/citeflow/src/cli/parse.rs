//! Parse command - canonical records of one input as JSON lines
//!
//! Nothing is stored; useful for checking a schema against real data.

use crate::cli::error::HelpfulError;
use anyhow::{Context, Result};
use citeflow_ingest::{open_input, IngestConfig, RecordAssembler, RecordSchema, RecordWalker};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Arguments for the parse command
#[derive(Debug)]
pub struct ParseArgs {
    pub file: PathBuf,
    pub schema: Option<PathBuf>,
    pub limit: Option<usize>,
    pub pretty: bool,
}

pub fn run(args: ParseArgs) -> Result<()> {
    let schema = resolve_schema(args.schema.as_deref())?;

    if !args.file.exists() {
        return Err(HelpfulError::path_not_found(&args.file).into());
    }
    let reader = open_input(&args.file)
        .map_err(|err| HelpfulError::cannot_read_file(&args.file, &err.to_string()))?;

    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let written = write_records(reader, &name, Arc::new(schema), &args, &mut out)?;
    out.flush()?;

    info!(file = %name, records = written, "Parse finished");
    Ok(())
}

/// `--schema`, else the configured schema, else the built-in one.
fn resolve_schema(explicit: Option<&Path>) -> Result<RecordSchema> {
    match explicit {
        Some(path) => RecordSchema::load(path)
            .map_err(|err| HelpfulError::invalid_schema(path, &err.to_string()).into()),
        None => {
            let config = IngestConfig::resolve(None).context("Failed to load config")?;
            crate::cli::ingest::load_schema(&config)
        }
    }
}

/// Walk `reader` and write one JSON document per record. Returns the number
/// written. A corrupt input fails after the records preceding the damage
/// have been written.
fn write_records<R: BufRead, W: Write>(
    reader: R,
    name: &str,
    schema: Arc<RecordSchema>,
    args: &ParseArgs,
    out: &mut W,
) -> Result<usize> {
    let assembler = RecordAssembler::new(schema);
    let mut walker = RecordWalker::new(reader, assembler.record_tag());
    let mut written = 0usize;

    while args.limit.map_or(true, |limit| written < limit) {
        let element = match walker.next_record() {
            Ok(Some(element)) => element,
            Ok(None) => break,
            Err(err) => {
                out.flush()?;
                return Err(anyhow::Error::new(err)
                    .context(format!("{} is corrupt after {} record(s)", name, written)));
            }
        };

        let record = assembler.assemble(&element, name);
        if args.pretty {
            serde_json::to_writer_pretty(&mut *out, &record)?;
        } else {
            serde_json::to_writer(&mut *out, &record)?;
        }
        writeln!(out)?;
        written += 1;
    }

    Ok(written)
}
