//! ACT/ABSTAIN counts over time and per category.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::models::{Category, Decision, Outcome};

use crate::buckets::TimeBucket;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub acted: u64,
    pub abstained: u64,
}

impl CategoryTotals {
    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Act => self.acted += 1,
            Outcome::Abstain => self.abstained += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.acted + self.abstained
    }

    /// `abstained / total`, 0.0 when empty.
    pub fn abstention_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.abstained as f64 / total as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstentionBucket {
    pub start: DateTime<Utc>,
    pub acted: u64,
    pub abstained: u64,
    pub abstention_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstentionTrends {
    pub bucket: TimeBucket,
    /// Oldest first; buckets without decisions are omitted.
    pub buckets: Vec<AbstentionBucket>,
    pub by_category: BTreeMap<Category, CategoryTotals>,
    pub overall: CategoryTotals,
    pub overall_rate: f64,
}

pub fn abstention_trends(decisions: &[Decision], bucket: TimeBucket) -> AbstentionTrends {
    let mut per_bucket: BTreeMap<DateTime<Utc>, CategoryTotals> = BTreeMap::new();
    let mut by_category: BTreeMap<Category, CategoryTotals> = BTreeMap::new();
    let mut overall = CategoryTotals::default();

    for decision in decisions {
        per_bucket
            .entry(bucket.floor(decision.created_at))
            .or_default()
            .add(decision.outcome);
        by_category
            .entry(decision.category)
            .or_default()
            .add(decision.outcome);
        overall.add(decision.outcome);
    }

    AbstentionTrends {
        bucket,
        buckets: per_bucket
            .into_iter()
            .map(|(start, totals)| AbstentionBucket {
                start,
                acted: totals.acted,
                abstained: totals.abstained,
                abstention_rate: totals.abstention_rate(),
            })
            .collect(),
        by_category,
        overall_rate: overall.abstention_rate(),
        overall,
    }
}
