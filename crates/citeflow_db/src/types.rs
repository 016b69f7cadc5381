//! Row types for the citation and ledger tables.

use serde::{Deserialize, Serialize};

/// One stored citation: the highest version seen for `pmid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRow {
    pub pmid: String,
    pub version: i64,
    /// Input file the stored version came from
    pub source_file: String,
    /// `name@version` of the schema that produced `record_json`
    pub schema_tag: String,
    /// Canonical record as JSON
    pub record_json: String,
    /// Milliseconds since Unix epoch
    pub updated_at: i64,
}

impl CitationRow {
    pub fn new(
        pmid: impl Into<String>,
        version: i64,
        source_file: impl Into<String>,
        schema_tag: impl Into<String>,
        record_json: impl Into<String>,
    ) -> Self {
        Self {
            pmid: pmid.into(),
            version,
            source_file: source_file.into(),
            schema_tag: schema_tag.into(),
            record_json: record_json.into(),
            updated_at: crate::CiteflowDb::now_millis(),
        }
    }
}

/// One fully ingested input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub file_id: String,
    pub records_seen: i64,
    pub upserted: i64,
    pub skipped: i64,
    /// Milliseconds since Unix epoch
    pub completed_at: i64,
}
