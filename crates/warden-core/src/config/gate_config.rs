use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::defaults;
use crate::models::{Category, Thresholds};

/// Confidence gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Deadline for a single evaluation (milliseconds).
    pub evaluation_deadline_ms: u64,
    /// Decisions retained in history.
    pub history_capacity: usize,
    /// Per-category overrides of the built-in thresholds.
    pub thresholds: BTreeMap<Category, Thresholds>,
}

impl GateConfig {
    /// Effective thresholds for a category.
    pub fn thresholds_for(&self, category: Category) -> Thresholds {
        self.thresholds
            .get(&category)
            .copied()
            .unwrap_or_else(|| Thresholds::default_for(category))
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            evaluation_deadline_ms: defaults::DEFAULT_EVALUATION_DEADLINE_MS,
            history_capacity: defaults::DEFAULT_DECISION_HISTORY_CAPACITY,
            thresholds: BTreeMap::new(),
        }
    }
}
