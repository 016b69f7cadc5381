//! SQLite persistence for Citeflow
//!
//! Two tables: `citations` (one row per PMID, highest version wins) and
//! `ingested_files` (the append-only ledger of completed input files).
//!
//! # Usage
//!
//! ```rust,ignore
//! use citeflow_db::{CiteflowDb, CitationRow};
//!
//! let db = CiteflowDb::open("~/.citeflow/citeflow.sqlite3").await?;
//!
//! let row = CitationRow::new("10000001", 2, "pubmed24n0001.xml.gz", "pubmed@3", json);
//! let written = db.citation_replace_if_newer(&row).await?;
//!
//! if !db.ledger_contains("pubmed24n0002.xml.gz").await? { /* ... */ }
//! ```

mod citations;
mod error;
mod ledger;
mod schema;
mod types;

pub use error::{DbError, Result};
pub use types::*;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Waiting for a pooled connection or a database lock longer than this
/// surfaces as a transient error.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 5;

/// Database handle for citations and the ingestion ledger.
#[derive(Clone)]
pub struct CiteflowDb {
    pool: SqlitePool,
}

impl CiteflowDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %path.display(), "Database opened");

        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::not_found(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        Self::open(path).await
    }

    /// Private in-memory database (single connection).
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    ///
    /// Prefer using the typed methods instead.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamp utilities
impl CiteflowDb {
    /// Current time as milliseconds since Unix epoch.
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Convert milliseconds to DateTime; `None` when out of range.
    pub fn millis_to_datetime(millis: i64) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(millis)
    }
}
