//! Store and ledger seams.
//!
//! The reconciler and driver only see these traits; the SQLite adapter lives
//! in the `citeflow` binary and [`MemoryStore`] backs tests and dry runs.

use crate::error::StoreError;
use crate::record::CanonicalRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Keyed record store holding at most one record per identifier.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stored version for `identifier`, if any.
    async fn current_version(&self, identifier: &str) -> Result<Option<i64>, StoreError>;

    /// Replace-or-insert `record` unless the stored version is already
    /// `>= record.version`. Must be atomic per identifier; returns whether a
    /// write happened.
    async fn replace_if_newer(&self, record: &CanonicalRecord) -> Result<bool, StoreError>;

    async fn get(&self, identifier: &str) -> Result<Option<CanonicalRecord>, StoreError>;
}

/// One fully ingested input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub file_id: String,
    pub records_seen: u64,
    pub upserted: u64,
    pub skipped: u64,
    /// Unix epoch milliseconds.
    pub completed_at: i64,
}

/// Append-only set of completed input files.
#[async_trait]
pub trait FileLedger: Send + Sync {
    async fn is_complete(&self, file_id: &str) -> Result<bool, StoreError>;

    /// Append `entry`. Appending a file that is already present is a no-op
    /// and returns `false`.
    async fn mark_complete(&self, entry: &LedgerEntry) -> Result<bool, StoreError>;

    /// All entries, ordered by file id.
    async fn entries(&self) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// In-process store and ledger.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, CanonicalRecord>>,
    ledger: Mutex<BTreeMap<String, LedgerEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored record, ordered by identifier.
    pub fn records(&self) -> Vec<CanonicalRecord> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        records
    }

    fn records_guard(&self) -> Result<MutexGuard<'_, HashMap<String, CanonicalRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::backend("record map lock poisoned"))
    }

    fn ledger_guard(&self) -> Result<MutexGuard<'_, BTreeMap<String, LedgerEntry>>, StoreError> {
        self.ledger
            .lock()
            .map_err(|_| StoreError::backend("ledger lock poisoned"))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn current_version(&self, identifier: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.records_guard()?.get(identifier).map(|record| record.version))
    }

    async fn replace_if_newer(&self, record: &CanonicalRecord) -> Result<bool, StoreError> {
        let mut records = self.records_guard()?;
        match records.get(&record.identifier) {
            Some(stored) if stored.version >= record.version => Ok(false),
            _ => {
                records.insert(record.identifier.clone(), record.clone());
                Ok(true)
            }
        }
    }

    async fn get(&self, identifier: &str) -> Result<Option<CanonicalRecord>, StoreError> {
        Ok(self.records_guard()?.get(identifier).cloned())
    }
}

#[async_trait]
impl FileLedger for MemoryStore {
    async fn is_complete(&self, file_id: &str) -> Result<bool, StoreError> {
        Ok(self.ledger_guard()?.contains_key(file_id))
    }

    async fn mark_complete(&self, entry: &LedgerEntry) -> Result<bool, StoreError> {
        let mut ledger = self.ledger_guard()?;
        if ledger.contains_key(&entry.file_id) {
            return Ok(false);
        }
        ledger.insert(entry.file_id.clone(), entry.clone());
        Ok(true)
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.ledger_guard()?.values().cloned().collect())
    }
}
