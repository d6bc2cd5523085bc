use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Alerting / escalation sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Initial backoff (doubles each retry).
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Deadline for a single notify attempt.
    pub delivery_timeout_ms: u64,
    /// Unacknowledged CRITICAL alerts are re-notified after this long.
    pub renotify_timeout_secs: u64,
    /// After this many re-notifications the decision expires.
    pub max_escalations: u32,
    /// HIGH/CRITICAL signals unacknowledged for this long raise an alert.
    pub signal_ack_ttl_secs: u64,
    pub history_capacity: usize,
    /// Background sweep interval.
    pub tick_interval_secs: u64,
}

impl AlertingConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::DEFAULT_MAX_RETRIES,
            initial_backoff_ms: defaults::DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: defaults::DEFAULT_MAX_BACKOFF_MS,
            delivery_timeout_ms: defaults::DEFAULT_DELIVERY_TIMEOUT_MS,
            renotify_timeout_secs: defaults::DEFAULT_RENOTIFY_TIMEOUT_SECS,
            max_escalations: defaults::DEFAULT_MAX_ESCALATIONS,
            signal_ack_ttl_secs: defaults::DEFAULT_SIGNAL_ACK_TTL_SECS,
            history_capacity: defaults::DEFAULT_ALERT_HISTORY_CAPACITY,
            tick_interval_secs: defaults::DEFAULT_TICK_INTERVAL_SECS,
        }
    }
}
