//! Ingestion ledger operations (append-only)

use crate::error::Result;
use crate::types::LedgerRow;
use crate::CiteflowDb;
use sqlx::Row;

impl CiteflowDb {
    pub async fn ledger_contains(&self, file_id: &str) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM ingested_files WHERE file_id = ?")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Append a completed file. Existing entries are never touched; returns
    /// `false` when `file_id` was already present.
    pub async fn ledger_append(&self, entry: &LedgerRow) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO ingested_files (file_id, records_seen, upserted, skipped, completed_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.file_id)
        .bind(entry.records_seen)
        .bind(entry.upserted)
        .bind(entry.skipped)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// All ledger entries, ordered by file id.
    pub async fn ledger_list(&self) -> Result<Vec<LedgerRow>> {
        let rows = sqlx::query(
            "SELECT file_id, records_seen, upserted, skipped, completed_at FROM ingested_files ORDER BY file_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| LedgerRow {
                file_id: row.get("file_id"),
                records_seen: row.get("records_seen"),
                upserted: row.get("upserted"),
                skipped: row.get("skipped"),
                completed_at: row.get("completed_at"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(file_id: &str, records_seen: i64) -> LedgerRow {
        LedgerRow {
            file_id: file_id.to_string(),
            records_seen,
            upserted: records_seen,
            skipped: 0,
            completed_at: CiteflowDb::now_millis(),
        }
    }

    #[tokio::test]
    async fn test_append_is_exactly_once() {
        let db = CiteflowDb::open_in_memory().await.unwrap();
        assert!(!db.ledger_contains("b.xml").await.unwrap());

        assert!(db.ledger_append(&entry("b.xml", 10)).await.unwrap());
        assert!(!db.ledger_append(&entry("b.xml", 99)).await.unwrap());
        assert!(db.ledger_append(&entry("a.xml", 1)).await.unwrap());

        assert!(db.ledger_contains("b.xml").await.unwrap());
        let rows = db.ledger_list().await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.file_id.as_str()).collect();
        assert_eq!(ids, vec!["a.xml", "b.xml"]);
        assert_eq!(rows[1].records_seen, 10);
    }
}
