//! One serializable snapshot of governance state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_alerting::AlertStats;
use warden_gate::GateStats;
use warden_ledger::{BiasScore, ConfidenceTrend, DisagreementPattern, OverrideStats};

use crate::abstention::AbstentionTrends;
use crate::signals::SignalStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceReport {
    pub generated_at: DateTime<Utc>,
    pub signals: SignalStats,
    pub decisions: GateStats,
    pub abstention: AbstentionTrends,
    pub overrides: OverrideStats,
    pub bias: Vec<BiasScore>,
    pub confidence_trend: ConfidenceTrend,
    pub top_disagreements: Vec<DisagreementPattern>,
    pub alerts: AlertStats,
}

impl GovernanceReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
