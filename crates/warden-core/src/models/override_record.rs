use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::Outcome;

/// A human verdict on an automated decision. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub id: String,
    pub decision_id: String,
    /// Source of the overridden decision, kept so bias queries survive
    /// eviction of the decision itself.
    pub source: String,
    pub automated_outcome: Outcome,
    pub human_outcome: Outcome,
    pub reviewer_id: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl OverrideRecord {
    pub fn is_disagreement(&self) -> bool {
        self.automated_outcome != self.human_outcome
    }
}
