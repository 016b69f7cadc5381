//! Batch driver: file-level orchestration of walk → assemble → reconcile.
//!
//! One file at a time, one record at a time. A file enters the ledger only
//! when it was walked to a clean end and every record either reached the
//! store or was deliberately skipped.

use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::record::RecordAssembler;
use crate::source::open_input;
use crate::store::{FileLedger, LedgerEntry};
use crate::walker::RecordWalker;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, info_span, warn, Instrument};

/// One input: its ledger name and where to read it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub path: PathBuf,
}

impl InputFile {
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Shared stop signal, checked before each file and between records.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    /// Walked to the end, every record settled, ledger entry written.
    Completed,
    /// Already in the ledger; not opened.
    AlreadyIngested,
    /// Malformed or truncated input. Records before the failure point stay
    /// stored.
    Corrupt,
    /// Walked to the end but some records failed terminally.
    Incomplete,
    /// Could not be opened.
    Unreadable,
    /// Ledger could not be read or written.
    LedgerUnavailable,
    /// Stopped by the cancellation flag.
    Cancelled,
}

impl FileOutcome {
    /// Outcomes that should fail a run.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Corrupt | Self::Incomplete | Self::Unreadable | Self::LedgerUnavailable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AlreadyIngested => "already_ingested",
            Self::Corrupt => "corrupt",
            Self::Incomplete => "incomplete",
            Self::Unreadable => "unreadable",
            Self::LedgerUnavailable => "ledger_unavailable",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub file: String,
    pub outcome: FileOutcome,
    pub records_seen: u64,
    pub upserted: u64,
    pub skipped: u64,
    pub empty_identifier: u64,
    pub failed: u64,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            outcome: FileOutcome::Completed,
            records_seen: 0,
            upserted: 0,
            skipped: 0,
            empty_identifier: 0,
            failed: 0,
            elapsed_ms: 0,
            error: None,
        }
    }

    fn finish(mut self, outcome: FileOutcome, started: Instant) -> Self {
        self.outcome = outcome;
        self.elapsed_ms = started.elapsed().as_millis() as u64;
        self
    }

    fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn records_seen(&self) -> u64 {
        self.files.iter().map(|f| f.records_seen).sum()
    }

    pub fn upserted(&self) -> u64 {
        self.files.iter().map(|f| f.upserted).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.files.iter().map(|f| f.skipped).sum()
    }

    pub fn empty_identifier(&self) -> u64 {
        self.files.iter().map(|f| f.empty_identifier).sum()
    }

    pub fn failed(&self) -> u64 {
        self.files.iter().map(|f| f.failed).sum()
    }

    pub fn count(&self, outcome: FileOutcome) -> usize {
        self.files.iter().filter(|f| f.outcome == outcome).count()
    }

    pub fn has_failures(&self) -> bool {
        self.files.iter().any(|f| f.outcome.is_failure())
    }
}

pub struct BatchDriver {
    assembler: RecordAssembler,
    reconciler: Reconciler,
    ledger: Arc<dyn FileLedger>,
    cancel: CancellationFlag,
}

impl BatchDriver {
    pub fn new(assembler: RecordAssembler, reconciler: Reconciler, ledger: Arc<dyn FileLedger>) -> Self {
        Self {
            assembler,
            reconciler,
            ledger,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Ingest `inputs` in order. Per-file failures are reported, never
    /// raised; once cancelled, remaining files are reported as cancelled.
    pub async fn run(&self, inputs: &[InputFile]) -> BatchReport {
        let mut report = BatchReport::default();
        for input in inputs {
            if self.cancel.is_cancelled() {
                report
                    .files
                    .push(FileReport::new(&input.name).finish(FileOutcome::Cancelled, Instant::now()));
                continue;
            }
            report.files.push(self.ingest_file(input).await);
        }

        info!(
            files = report.files.len(),
            completed = report.count(FileOutcome::Completed),
            already_ingested = report.count(FileOutcome::AlreadyIngested),
            records = report.records_seen(),
            upserted = report.upserted(),
            skipped = report.skipped(),
            "Batch finished"
        );
        report
    }

    /// Ingest one file from disk, skipping it if the ledger already has it.
    pub async fn ingest_file(&self, input: &InputFile) -> FileReport {
        let span = info_span!("ingest_file", file = %input.name);
        async move {
            let started = Instant::now();
            if let Some(report) = self.check_ledger(&input.name, started).await {
                return report;
            }

            let reader = match open_input(&input.path) {
                Ok(reader) => reader,
                Err(err) => {
                    warn!(path = %input.path.display(), error = %err, "Cannot open input");
                    return FileReport::new(&input.name)
                        .finish(FileOutcome::Unreadable, started)
                        .with_error(err);
                }
            };
            self.process(&input.name, reader, started).await
        }
        .instrument(span)
        .await
    }

    /// Ingest an already opened (and decompressed) stream under `name`.
    pub async fn ingest_reader<R: BufRead>(&self, name: &str, reader: R) -> FileReport {
        let span = info_span!("ingest_file", file = %name);
        async move {
            let started = Instant::now();
            if let Some(report) = self.check_ledger(name, started).await {
                return report;
            }
            self.process(name, reader, started).await
        }
        .instrument(span)
        .await
    }

    async fn check_ledger(&self, name: &str, started: Instant) -> Option<FileReport> {
        match self.ledger.is_complete(name).await {
            Ok(false) => None,
            Ok(true) => {
                info!("Already ingested, skipping");
                Some(FileReport::new(name).finish(FileOutcome::AlreadyIngested, started))
            }
            Err(err) => {
                warn!(error = %err, "Ledger lookup failed");
                Some(
                    FileReport::new(name)
                        .finish(FileOutcome::LedgerUnavailable, started)
                        .with_error(err),
                )
            }
        }
    }

    async fn process<R: BufRead>(&self, name: &str, reader: R, started: Instant) -> FileReport {
        let mut report = FileReport::new(name);
        let mut walker = RecordWalker::new(reader, self.assembler.record_tag());

        loop {
            if self.cancel.is_cancelled() {
                warn!(records = report.records_seen, "Cancelled mid-file, not marking complete");
                return report.finish(FileOutcome::Cancelled, started);
            }

            let element = match walker.next_record() {
                Ok(Some(element)) => element,
                Ok(None) => break,
                Err(err) => {
                    warn!(
                        records = report.records_seen,
                        upserted = report.upserted,
                        error = %err,
                        "Corrupt input, keeping records read so far"
                    );
                    return report.finish(FileOutcome::Corrupt, started).with_error(err);
                }
            };

            report.records_seen += 1;
            let record = self.assembler.assemble(&element, name);
            drop(element);

            match self.reconciler.reconcile(&record).await {
                Ok(ReconcileOutcome::Upserted { .. }) => report.upserted += 1,
                Ok(ReconcileOutcome::Skipped { .. }) => report.skipped += 1,
                Ok(ReconcileOutcome::EmptyIdentifier) => report.empty_identifier += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(error = %err, "Record not reconciled");
                }
            }
        }

        if report.failed > 0 {
            warn!(failed = report.failed, "Some records failed, not marking complete");
            let message = format!("{} record(s) could not be stored", report.failed);
            return report.finish(FileOutcome::Incomplete, started).with_error(message);
        }

        let entry = LedgerEntry {
            file_id: name.to_string(),
            records_seen: report.records_seen,
            upserted: report.upserted,
            skipped: report.skipped,
            completed_at: now_millis(),
        };
        match self.ledger.mark_complete(&entry).await {
            Ok(_) => {
                let stats = walker.stats();
                info!(
                    records = report.records_seen,
                    upserted = report.upserted,
                    skipped = report.skipped,
                    empty_identifier = report.empty_identifier,
                    bytes = stats.bytes_read,
                    peak_live_elements = stats.peak_live_elements,
                    "File ingested"
                );
                report.finish(FileOutcome::Completed, started)
            }
            Err(err) => {
                warn!(error = %err, "Could not append ledger entry");
                report
                    .finish(FileOutcome::LedgerUnavailable, started)
                    .with_error(err)
            }
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordSchema;
    use crate::store::{MemoryStore, RecordStore};
    use std::sync::atomic::AtomicU32;

    fn article(pmid: &str, version: u32) -> String {
        format!(
            "<PubmedArticle><MedlineCitation><PMID Version=\"{version}\">{pmid}</PMID>\
             <Article><ArticleTitle>Title {pmid}</ArticleTitle></Article>\
             </MedlineCitation></PubmedArticle>"
        )
    }

    fn driver(store: Arc<MemoryStore>) -> BatchDriver {
        let assembler = RecordAssembler::new(Arc::new(RecordSchema::pubmed().unwrap()));
        BatchDriver::new(assembler, Reconciler::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_completed_file_enters_ledger_once() {
        let store = Arc::new(MemoryStore::new());
        let driver = driver(store.clone());
        let xml = format!("<PubmedArticleSet>{}{}</PubmedArticleSet>", article("1", 1), article("2", 1));

        let first = driver.ingest_reader("a.xml", xml.as_bytes()).await;
        assert_eq!(first.outcome, FileOutcome::Completed);
        assert_eq!((first.records_seen, first.upserted), (2, 2));
        assert!(store.is_complete("a.xml").await.unwrap());

        let second = driver.ingest_reader("a.xml", xml.as_bytes()).await;
        assert_eq!(second.outcome, FileOutcome::AlreadyIngested);
        assert_eq!(second.records_seen, 0);
        assert_eq!(store.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_keeps_prefix_and_skips_ledger() {
        let store = Arc::new(MemoryStore::new());
        let driver = driver(store.clone());
        let xml = format!(
            "<PubmedArticleSet>{}{}<PubmedArticle><MedlineCitation><PMID>3",
            article("1", 1),
            article("2", 1)
        );

        let report = driver.ingest_reader("broken.xml", xml.as_bytes()).await;
        assert_eq!(report.outcome, FileOutcome::Corrupt);
        assert!(report.error.as_deref().unwrap_or_default().contains("corrupt input"));
        assert_eq!(report.upserted, 2);
        assert_eq!(store.len(), 2);
        assert!(!store.is_complete("broken.xml").await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_record() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationFlag::new();
        let driver = driver(store.clone()).with_cancellation(cancel.clone());
        cancel.cancel();

        let xml = format!("<PubmedArticleSet>{}</PubmedArticleSet>", article("1", 1));
        let report = driver.ingest_reader("a.xml", xml.as_bytes()).await;
        assert_eq!(report.outcome, FileOutcome::Cancelled);
        assert!(store.is_empty());
        assert!(!store.is_complete("a.xml").await.unwrap());

        let batch = driver.run(&[InputFile::new("b.xml", "/nonexistent/b.xml")]).await;
        assert_eq!(batch.count(FileOutcome::Cancelled), 1);
        assert!(!batch.has_failures());
    }

    /// Raises the cancellation flag once a fixed number of writes succeeded.
    struct CancelAfterWrites {
        inner: MemoryStore,
        cancel: CancellationFlag,
        limit: u32,
        writes: AtomicU32,
    }

    #[async_trait::async_trait]
    impl RecordStore for CancelAfterWrites {
        async fn current_version(&self, identifier: &str) -> Result<Option<i64>, crate::error::StoreError> {
            self.inner.current_version(identifier).await
        }

        async fn replace_if_newer(
            &self,
            record: &crate::record::CanonicalRecord,
        ) -> Result<bool, crate::error::StoreError> {
            let replaced = self.inner.replace_if_newer(record).await?;
            if self.writes.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
                self.cancel.cancel();
            }
            Ok(replaced)
        }

        async fn get(
            &self,
            identifier: &str,
        ) -> Result<Option<crate::record::CanonicalRecord>, crate::error::StoreError> {
            self.inner.get(identifier).await
        }
    }

    #[tokio::test]
    async fn test_cancelled_mid_file_keeps_prefix_and_skips_ledger() {
        let cancel = CancellationFlag::new();
        let records = Arc::new(CancelAfterWrites {
            inner: MemoryStore::new(),
            cancel: cancel.clone(),
            limit: 2,
            writes: AtomicU32::new(0),
        });
        let ledger = Arc::new(MemoryStore::new());
        let assembler = RecordAssembler::new(Arc::new(RecordSchema::pubmed().unwrap()));
        let driver = BatchDriver::new(assembler, Reconciler::new(records.clone()), ledger.clone())
            .with_cancellation(cancel.clone());

        let xml = format!(
            "<PubmedArticleSet>{}{}{}{}</PubmedArticleSet>",
            article("1", 1),
            article("2", 1),
            article("3", 1),
            article("4", 1)
        );
        let report = driver.ingest_reader("mid.xml", xml.as_bytes()).await;

        assert_eq!(report.outcome, FileOutcome::Cancelled);
        assert_eq!(report.upserted, 2);
        assert_eq!(records.current_version("1").await.unwrap(), Some(1));
        assert_eq!(records.current_version("2").await.unwrap(), Some(1));
        assert_eq!(records.current_version("3").await.unwrap(), None);
        assert_eq!(records.current_version("4").await.unwrap(), None);
        assert!(!ledger.is_complete("mid.xml").await.unwrap());
        assert!(ledger.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let driver = driver(store.clone());
        let batch = driver
            .run(&[InputFile::new("missing.xml", "/nonexistent/missing.xml")])
            .await;
        assert_eq!(batch.files[0].outcome, FileOutcome::Unreadable);
        assert!(batch.has_failures());
    }

    #[tokio::test]
    async fn test_empty_identifier_does_not_block_completion() {
        let store = Arc::new(MemoryStore::new());
        let driver = driver(store.clone());
        let xml = format!(
            "<PubmedArticleSet>{}<PubmedArticle><MedlineCitation/></PubmedArticle>{}</PubmedArticleSet>",
            article("1", 1),
            article("2", 1)
        );

        let report = driver.ingest_reader("a.xml", xml.as_bytes()).await;
        assert_eq!(report.outcome, FileOutcome::Completed);
        assert_eq!(report.empty_identifier, 1);
        assert_eq!(report.upserted, 2);
        assert_eq!(store.get("").await.unwrap(), None);
    }

    #[test]
    fn test_batch_report_totals() {
        let mut ok = FileReport::new("a");
        ok.records_seen = 3;
        ok.upserted = 2;
        ok.skipped = 1;
        let mut bad = FileReport::new("b");
        bad.outcome = FileOutcome::Incomplete;
        bad.records_seen = 1;
        bad.failed = 1;

        let batch = BatchReport { files: vec![ok, bad] };
        assert_eq!(batch.records_seen(), 4);
        assert_eq!(batch.upserted(), 2);
        assert_eq!(batch.failed(), 1);
        assert!(batch.has_failures());
        assert_eq!(serde_json::to_value(FileOutcome::AlreadyIngested).unwrap(), "already_ingested");
    }
}
