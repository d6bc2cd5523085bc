use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flag tier. Safe mode masks every ADVANCED flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlagTier {
    Baseline,
    Advanced,
}

/// A runtime-toggleable capability gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub enabled: bool,
    /// Kill switch. Overrides `enabled`.
    pub killed: bool,
    pub tier: FlagTier,
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    pub fn new(name: impl Into<String>, tier: FlagTier, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            killed: false,
            tier,
            updated_at: Utc::now(),
        }
    }

    /// `enabled && !killed && !(safe_mode && tier == ADVANCED)`.
    pub fn is_effective(&self, safe_mode: bool) -> bool {
        self.enabled && !self.killed && !(safe_mode && self.tier == FlagTier::Advanced)
    }
}
