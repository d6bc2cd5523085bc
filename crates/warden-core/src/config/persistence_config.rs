use serde::{Deserialize, Serialize};

use super::defaults;
use crate::traits::RetentionPolicy;

/// Persistence configuration. When `db_path` is `None` the governance core
/// runs purely in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub db_path: Option<String>,
    /// Write-behind flush interval.
    pub flush_interval_ms: u64,
    /// Pending records that trigger an early flush; also the largest batch
    /// handed to the backend in one write.
    pub batch_size: usize,
    /// Records held while the backend is failing. Beyond this the oldest
    /// pending record is dropped.
    pub max_pending: usize,
    pub max_records_per_kind: Option<usize>,
    pub max_age_days: Option<i64>,
}

impl PersistenceConfig {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_records_per_kind: self.max_records_per_kind,
            max_age_days: self.max_age_days,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            flush_interval_ms: defaults::DEFAULT_FLUSH_INTERVAL_MS,
            batch_size: defaults::DEFAULT_FLUSH_BATCH_SIZE,
            max_pending: defaults::DEFAULT_MAX_PENDING_RECORDS,
            max_records_per_kind: Some(defaults::DEFAULT_RETENTION_MAX_RECORDS),
            max_age_days: Some(defaults::DEFAULT_RETENTION_MAX_AGE_DAYS),
        }
    }
}
