//! Error types for the ingestion core.
//!
//! Only [`IngestError`] ends a batch. Everything else is scoped to a single
//! record or a single file and is turned into a report entry by the driver.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed path syntax in a schema declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty step in path '{0}'")]
    EmptyStep(String),

    #[error("malformed attribute selector in path '{path}': {reason}")]
    Selector { path: String, reason: String },
}

/// Invalid or unreadable record schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid schema TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render schema: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid schema: {0}")]
    Invalid(String),
}

impl SchemaError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Failure of the streaming walker. Records delivered before the failure
/// point stay valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("corrupt input at byte {position}: {message}")]
    CorruptInput { position: u64, message: String },
}

impl WalkError {
    pub(crate) fn corrupt(position: u64, message: impl Into<String>) -> Self {
        Self::CorruptInput {
            position,
            message: message.into(),
        }
    }
}

/// Error reported by a [`crate::RecordStore`] or [`crate::FileLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient: timeouts, busy/locked database, dropped connections.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Permanent backend failure (constraint, schema mismatch, ...).
    #[error("store error: {0}")]
    Backend(String),

    #[error("record serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Terminal failure to reconcile one record.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store unavailable for '{identifier}' after {attempts} attempt(s)")]
    StoreUnavailable {
        identifier: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("store rejected '{identifier}'")]
    Rejected {
        identifier: String,
        #[source]
        source: StoreError,
    },
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Errors that stop a whole batch (input enumeration and setup).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Input path not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to enumerate inputs under {root}: {source}")]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(StoreError::unavailable("pool timed out").is_retryable());
        assert!(!StoreError::backend("constraint").is_retryable());
        assert!(!StoreError::Serialization("bad".into()).is_retryable());
    }

    #[test]
    fn test_corrupt_input_message() {
        let err = WalkError::corrupt(42, "unexpected end of input");
        assert_eq!(
            err.to_string(),
            "corrupt input at byte 42: unexpected end of input"
        );
    }
}
