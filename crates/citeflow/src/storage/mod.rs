//! Storage backends for the ingestion pipeline.

pub mod sqlite;

pub use sqlite::SqliteStore;
