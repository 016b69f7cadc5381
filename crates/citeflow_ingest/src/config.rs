//! Configuration for ingestion runs

use crate::error::{ConfigError, SchemaError};
use crate::reconcile::RetryPolicy;
use crate::schema::RecordSchema;
use citeflow_logging::citeflow_home;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "citeflow.sqlite3";

/// Main configuration for `citeflow ingest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Path to the SQLite database
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Record schema TOML; the built-in PubMed schema when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,

    /// File name suffixes picked up when ingesting a directory
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Store retry budget per record
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Backoff settings for transient store failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_database_path() -> String {
    citeflow_home()
        .join(DATABASE_FILE)
        .to_string_lossy()
        .to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["xml".to_string(), "gz".to_string()]
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            schema_path: None,
            extensions: default_extensions(),
            retry: RetryConfig::default(),
        }
    }
}

impl IngestConfig {
    /// `~/.citeflow/config.toml` (or under `$CITEFLOW_HOME`)
    pub fn default_path() -> PathBuf {
        citeflow_home().join(CONFIG_FILE)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: IngestConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// An explicit path must exist; otherwise the default file is used when
    /// present, and built-in defaults when not.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path = Self::default_path();
        if default_path.is_file() {
            tracing::debug!(path = %default_path.display(), "Loading config");
            Self::load(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The configured schema, or the built-in PubMed schema.
    pub fn load_schema(&self) -> Result<RecordSchema, SchemaError> {
        match &self.schema_path {
            Some(path) => RecordSchema::load(Path::new(path)),
            None => RecordSchema::pubmed(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }
}
