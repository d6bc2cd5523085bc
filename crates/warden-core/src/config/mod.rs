//! Configuration for every governance subsystem.
//!
//! All sections use `#[serde(default)]`, so an empty TOML document yields the
//! built-in defaults and partial documents override only what they name.

pub mod alerting_config;
pub mod bus_config;
pub mod defaults;
pub mod gate_config;
pub mod ledger_config;
pub mod observability_config;
pub mod persistence_config;

pub use alerting_config::AlertingConfig;
pub use bus_config::{BusConfig, OverflowPolicy};
pub use gate_config::GateConfig;
pub use ledger_config::LedgerConfig;
pub use observability_config::ObservabilityConfig;
pub use persistence_config::PersistenceConfig;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub bus: BusConfig,
    pub gate: GateConfig,
    pub ledger: LedgerConfig,
    pub alerting: AlertingConfig,
    pub persistence: PersistenceConfig,
    pub observability: ObservabilityConfig,
}

impl WardenConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no subsystem can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("bus.history_capacity", self.bus.history_capacity as u64)?;
        require_positive("bus.dedup_ttl_secs", self.bus.dedup_ttl_secs)?;
        require_positive(
            "bus.subscriber_queue_capacity",
            self.bus.subscriber_queue_capacity as u64,
        )?;
        require_positive("gate.history_capacity", self.gate.history_capacity as u64)?;
        require_positive(
            "gate.evaluation_deadline_ms",
            self.gate.evaluation_deadline_ms,
        )?;
        for thresholds in self.gate.thresholds.values() {
            thresholds.validate()?;
        }
        require_positive("ledger.bias_window_secs", self.ledger.bias_window_secs)?;
        require_positive("ledger.trend_sma_window", self.ledger.trend_sma_window as u64)?;
        if !self.ledger.trend_dead_band.is_finite() || self.ledger.trend_dead_band < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "ledger.trend_dead_band".into(),
                reason: format!("must be >= 0, got {}", self.ledger.trend_dead_band),
            });
        }
        require_positive(
            "alerting.history_capacity",
            self.alerting.history_capacity as u64,
        )?;
        require_positive(
            "alerting.delivery_timeout_ms",
            self.alerting.delivery_timeout_ms,
        )?;
        if self.alerting.initial_backoff_ms > self.alerting.max_backoff_ms {
            return Err(ConfigError::InvalidValue {
                key: "alerting.initial_backoff_ms".into(),
                reason: format!(
                    "initial backoff {}ms exceeds max backoff {}ms",
                    self.alerting.initial_backoff_ms, self.alerting.max_backoff_ms
                ),
            });
        }
        require_positive("persistence.batch_size", self.persistence.batch_size as u64)?;
        if self.persistence.max_pending < self.persistence.batch_size {
            return Err(ConfigError::InvalidValue {
                key: "persistence.max_pending".into(),
                reason: format!(
                    "max pending {} is below batch size {}",
                    self.persistence.max_pending, self.persistence.batch_size
                ),
            });
        }
        Ok(())
    }
}

fn require_positive(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
