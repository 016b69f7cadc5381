//! SQLite implementation of the ingestion store traits.
//!
//! Thin adapter over [`CiteflowDb`]: canonical records go in as JSON and
//! come back retyped against the ingest schema. Database errors are
//! classified so the reconciler only retries the ones that can succeed on a
//! later attempt.

use async_trait::async_trait;
use citeflow_db::{CitationRow, CiteflowDb, DbError, LedgerRow};
use citeflow_ingest::{
    CanonicalRecord, FileLedger, LedgerEntry, RecordSchema, RecordStore, StoreError,
};
use std::path::Path;
use std::sync::Arc;

/// Record store and ledger backed by one SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    db: CiteflowDb,
    schema: Arc<RecordSchema>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub async fn open(path: &Path, schema: Arc<RecordSchema>) -> anyhow::Result<Self> {
        let db = CiteflowDb::open(path).await?;
        Ok(Self { db, schema })
    }

    pub fn from_db(db: CiteflowDb, schema: Arc<RecordSchema>) -> Self {
        Self { db, schema }
    }

    pub fn db(&self) -> &CiteflowDb {
        &self.db
    }
}

fn store_error(err: DbError) -> StoreError {
    if err.is_transient() {
        StoreError::unavailable(err.to_string())
    } else {
        StoreError::backend(err.to_string())
    }
}

fn ledger_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn current_version(&self, identifier: &str) -> Result<Option<i64>, StoreError> {
        self.db.citation_version(identifier).await.map_err(store_error)
    }

    async fn replace_if_newer(&self, record: &CanonicalRecord) -> Result<bool, StoreError> {
        let row = CitationRow::new(
            record.identifier.as_str(),
            record.version,
            record.source_file.as_str(),
            record.schema.as_str(),
            record.to_json()?,
        );
        self.db.citation_replace_if_newer(&row).await.map_err(store_error)
    }

    async fn get(&self, identifier: &str) -> Result<Option<CanonicalRecord>, StoreError> {
        let Some(row) = self.db.citation_get(identifier).await.map_err(store_error)? else {
            return Ok(None);
        };
        Ok(Some(CanonicalRecord::from_json_for(&row.record_json, &self.schema)?))
    }
}

#[async_trait]
impl FileLedger for SqliteStore {
    async fn is_complete(&self, file_id: &str) -> Result<bool, StoreError> {
        self.db.ledger_contains(file_id).await.map_err(store_error)
    }

    async fn mark_complete(&self, entry: &LedgerEntry) -> Result<bool, StoreError> {
        let row = LedgerRow {
            file_id: entry.file_id.clone(),
            records_seen: ledger_count(entry.records_seen),
            upserted: ledger_count(entry.upserted),
            skipped: ledger_count(entry.skipped),
            completed_at: entry.completed_at,
        };
        self.db.ledger_append(&row).await.map_err(store_error)
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = self.db.ledger_list().await.map_err(store_error)?;
        Ok(rows
            .into_iter()
            .map(|row| LedgerEntry {
                file_id: row.file_id,
                records_seen: row.records_seen.max(0) as u64,
                upserted: row.upserted.max(0) as u64,
                skipped: row.skipped.max(0) as u64,
                completed_at: row.completed_at,
            })
            .collect())
    }
}
