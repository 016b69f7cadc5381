//! Database schema creation.
//!
//! All CREATE TABLE statements live here - single source of truth.

use crate::error::Result;
use crate::CiteflowDb;
use tracing::info;

impl CiteflowDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // Citations: one row per PMID, always the highest version seen
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS citations (
                pmid TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                source_file TEXT NOT NULL,
                schema_tag TEXT NOT NULL,
                record_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_citations_source ON citations(source_file)")
            .execute(&self.pool)
            .await?;

        // Ledger: append-only set of fully ingested input files
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS ingested_files (
                file_id TEXT PRIMARY KEY,
                records_seen INTEGER NOT NULL DEFAULT 0,
                upserted INTEGER NOT NULL DEFAULT 0,
                skipped INTEGER NOT NULL DEFAULT 0,
                completed_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema verified");
        Ok(())
    }
}
