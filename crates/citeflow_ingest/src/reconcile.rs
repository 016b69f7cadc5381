//! Version reconciliation: highest version per identifier wins.
//!
//! Per record the reconciler reads the stored version, skips when it is
//! already `>=` the incoming one, and otherwise asks the store for an atomic
//! replace-if-newer. Transient store failures are retried with capped
//! exponential backoff; after the last attempt the record is reported and
//! left untouched.

use crate::error::{ReconcileError, StoreError};
use crate::record::CanonicalRecord;
use crate::store::RecordStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 100;
const DEFAULT_MAX_DELAY_MS: u64 = 2_000;

/// Retry budget for one store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// No retries, no sleeping.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sleep before attempt `attempt + 1`, doubling from `base_delay` and
    /// capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Written; `previous` is the version it replaced.
    Upserted { previous: Option<i64> },
    /// Stored version was already equal or newer.
    Skipped { stored: Option<i64> },
    /// No identifier; never written.
    EmptyIdentifier,
}

pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    retry: RetryPolicy,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn reconcile(&self, record: &CanonicalRecord) -> Result<ReconcileOutcome, ReconcileError> {
        if !record.has_identifier() {
            warn!(source_file = %record.source_file, "Record has empty identifier, not stored");
            return Ok(ReconcileOutcome::EmptyIdentifier);
        }
        let identifier = record.identifier.as_str();

        let stored = self
            .call_with_retry(identifier, || self.store.current_version(identifier))
            .await?;
        if let Some(stored_version) = stored {
            if stored_version >= record.version {
                debug!(
                    identifier,
                    stored_version,
                    incoming_version = record.version,
                    "Skipping stale record"
                );
                return Ok(ReconcileOutcome::Skipped { stored });
            }
        }

        let written = self
            .call_with_retry(identifier, || self.store.replace_if_newer(record))
            .await?;
        if written {
            debug!(identifier, version = record.version, previous = ?stored, "Upserted record");
            Ok(ReconcileOutcome::Upserted { previous: stored })
        } else {
            // A concurrent writer stored an equal or newer version in between.
            debug!(identifier, version = record.version, "Lost replace race, skipping");
            Ok(ReconcileOutcome::Skipped { stored })
        }
    }

    async fn call_with_retry<T, F, Fut>(&self, identifier: &str, mut call: F) -> Result<T, ReconcileError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        identifier,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Store unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_retryable() => {
                    return Err(ReconcileError::StoreUnavailable {
                        identifier: identifier.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => {
                    return Err(ReconcileError::Rejected {
                        identifier: identifier.to_string(),
                        source: err,
                    });
                }
            }
        }
    }
}
