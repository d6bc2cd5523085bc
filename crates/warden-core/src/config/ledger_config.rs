use serde::{Deserialize, Serialize};

use super::defaults;

/// Override ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Rolling window for bias scores (seconds).
    pub bias_window_secs: u64,
    /// Slope magnitude treated as "stable".
    pub trend_dead_band: f64,
    /// Window of the simple moving average used for trend slopes.
    pub trend_sma_window: usize,
    /// Override records retained in memory.
    pub history_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            bias_window_secs: defaults::DEFAULT_BIAS_WINDOW_SECS,
            trend_dead_band: defaults::DEFAULT_TREND_DEAD_BAND,
            trend_sma_window: defaults::DEFAULT_TREND_SMA_WINDOW,
            history_capacity: defaults::DEFAULT_OVERRIDE_HISTORY_CAPACITY,
        }
    }
}
