//! Citeflow library surface shared by the CLI and its integration tests.

pub mod storage;

pub use storage::SqliteStore;
