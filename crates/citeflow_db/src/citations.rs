//! Citation operations (one row per PMID, highest version wins)

use crate::error::Result;
use crate::types::CitationRow;
use crate::CiteflowDb;
use sqlx::Row;

impl CiteflowDb {
    /// Stored version for `pmid`, if any.
    pub async fn citation_version(&self, pmid: &str) -> Result<Option<i64>> {
        let version = sqlx::query_scalar::<_, i64>("SELECT version FROM citations WHERE pmid = ?")
            .bind(pmid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }

    /// Insert `citation`, or replace the stored row when it carries a
    /// strictly newer version. The comparison happens inside the single
    /// statement, so concurrent writers cannot lose an update.
    ///
    /// Returns whether a row was written.
    pub async fn citation_replace_if_newer(&self, citation: &CitationRow) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO citations (pmid, version, source_file, schema_tag, record_json, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(pmid) DO UPDATE SET
                version = excluded.version,
                source_file = excluded.source_file,
                schema_tag = excluded.schema_tag,
                record_json = excluded.record_json,
                updated_at = excluded.updated_at
            WHERE excluded.version > citations.version
            "#,
        )
        .bind(&citation.pmid)
        .bind(citation.version)
        .bind(&citation.source_file)
        .bind(&citation.schema_tag)
        .bind(&citation.record_json)
        .bind(citation.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a citation by PMID
    pub async fn citation_get(&self, pmid: &str) -> Result<Option<CitationRow>> {
        let row = sqlx::query(
            "SELECT pmid, version, source_file, schema_tag, record_json, updated_at FROM citations WHERE pmid = ?",
        )
        .bind(pmid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_citation))
    }

    pub async fn citation_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM citations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_citation(row: &sqlx::sqlite::SqliteRow) -> CitationRow {
    CitationRow {
        pmid: row.get("pmid"),
        version: row.get("version"),
        source_file: row.get("source_file"),
        schema_tag: row.get("schema_tag"),
        record_json: row.get("record_json"),
        updated_at: row.get("updated_at"),
    }
}
