//! Citeflow Ingest - streaming extraction and version-reconciling ingestion
//!
//! Turns large (optionally gzip-compressed) XML containers of bibliographic
//! records into one canonical record per identifier in a keyed store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │  Input   │──▶│ RecordWalker │──▶│ Assembler │──▶│ Reconciler │──▶│  Store   │
//! │ (.xml.gz)│   │ (one record) │   │ (schema)  │   │ (skip/put) │   │ + Ledger │
//! └──────────┘   └──────────────┘   └───────────┘   └────────────┘   └──────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Element**: the owned subtree of exactly one record; released as soon as
//!   the record has been reconciled.
//! - **ElementPath**: `A/B/C[@attr='v']` lookups relative to an element.
//! - **RecordSchema**: declarative field list (TOML) interpreted by the extractor.
//! - **Reconciler**: highest version per identifier wins, replays are no-ops.
//! - **Ledger**: append-only set of fully ingested files.

pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod source;
pub mod store;
pub mod walker;
pub mod xml;

pub use config::{IngestConfig, RetryConfig};
pub use driver::{BatchDriver, BatchReport, CancellationFlag, FileOutcome, FileReport, InputFile};
pub use error::{
    ConfigError, IngestError, PathError, ReconcileError, SchemaError, StoreError, WalkError,
};
pub use extract::{extract, Entity, FieldDecl, FieldMode, FieldValue};
pub use reconcile::{ReconcileOutcome, Reconciler, RetryPolicy};
pub use record::{CanonicalRecord, RecordAssembler};
pub use schema::{EntityDecl, IdentifierDecl, RecordSchema};
pub use source::{decode_stream, discover_inputs, open_input};
pub use store::{FileLedger, LedgerEntry, MemoryStore, RecordStore};
pub use walker::{walk, RecordWalker, WalkStats};
pub use xml::{resolve, Element, ElementPath, Node};
