//! CLI module for Citeflow
//!
//! Each subcommand owns its argument struct and a synchronous `run`; the
//! ones that touch the store build their own Tokio runtime.

pub mod error;
pub mod output;

pub mod config;
pub mod ingest;
pub mod ledger;
pub mod parse;
pub mod schema;
pub mod show;

use citeflow_ingest::IngestConfig;
use std::path::{Path, PathBuf};

/// Database path from `--db`, else from the resolved config.
pub(crate) fn database_path(explicit: Option<PathBuf>, config: &IngestConfig) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(&config.database_path))
}

pub(crate) fn current_thread_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Open the database for read-only commands; a missing file is an error
/// rather than an empty store.
pub(crate) async fn open_existing_db(path: &Path) -> anyhow::Result<citeflow_db::CiteflowDb> {
    match citeflow_db::CiteflowDb::open_existing(path).await {
        Ok(db) => Ok(db),
        Err(citeflow_db::DbError::NotFound(_)) => {
            Err(error::HelpfulError::database_not_found(path).into())
        }
        Err(err) => Err(err.into()),
    }
}
