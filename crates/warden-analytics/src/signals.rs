//! Signal counts by severity, source, type, and time bucket.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::models::{Severity, Signal};

use crate::buckets::TimeBucket;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCount {
    pub start: DateTime<Utc>,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    /// Accepted signals still in history.
    pub total: u64,
    pub by_severity: BTreeMap<Severity, u64>,
    pub by_source: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
    /// Oldest bucket first. Empty buckets are omitted.
    pub by_bucket: Vec<BucketCount>,
    pub suppressed_total: u64,
    /// Dedup keys with suppressed duplicates, most suppressed first.
    pub top_suppressed: Vec<(String, u64)>,
}

/// Aggregate `history` and per-key suppression counts.
pub fn signal_stats(
    history: &[Signal],
    suppressed: &[(String, u64)],
    bucket: TimeBucket,
    top_n: usize,
) -> SignalStats {
    let mut stats = SignalStats {
        total: history.len() as u64,
        ..SignalStats::default()
    };
    let mut buckets: BTreeMap<DateTime<Utc>, u64> = BTreeMap::new();
    for signal in history {
        *stats.by_severity.entry(signal.severity).or_insert(0) += 1;
        *stats.by_source.entry(signal.source.clone()).or_insert(0) += 1;
        *stats
            .by_type
            .entry(signal.signal_type.as_str().to_string())
            .or_insert(0) += 1;
        *buckets.entry(bucket.floor(signal.timestamp)).or_insert(0) += 1;
    }
    stats.by_bucket = buckets
        .into_iter()
        .map(|(start, count)| BucketCount { start, count })
        .collect();

    stats.suppressed_total = suppressed.iter().map(|(_, n)| n).sum();
    let mut top: Vec<(String, u64)> = suppressed.to_vec();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(top_n);
    stats.top_suppressed = top;
    stats
}
