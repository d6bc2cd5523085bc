//! Bias scores and risk tiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_core::constants::{BIAS_CRITICAL_ABOVE, BIAS_HIGH_FROM, BIAS_MEDIUM_FROM};

/// Classification of a source's disagreement rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// CRITICAL above 40%, HIGH from 25% to 40%, MEDIUM from 10% to 25%,
    /// LOW below 10%.
    pub fn classify(score: f64) -> Self {
        if score > BIAS_CRITICAL_ABOVE {
            Self::Critical
        } else if score >= BIAS_HIGH_FROM {
            Self::High
        } else if score >= BIAS_MEDIUM_FROM {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `disagreements / total_decisions` for one source over a rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasScore {
    pub source: String,
    pub window_secs: u64,
    pub total_decisions: u64,
    pub disagreements: u64,
    pub score: f64,
    pub tier: RiskTier,
}

impl BiasScore {
    pub fn new(source: &str, window_secs: u64, total_decisions: u64, disagreements: u64) -> Self {
        let score = if total_decisions == 0 {
            0.0
        } else {
            disagreements as f64 / total_decisions as f64
        };
        Self {
            source: source.to_string(),
            window_secs,
            total_decisions,
            disagreements,
            score,
            tier: RiskTier::classify(score),
        }
    }
}
