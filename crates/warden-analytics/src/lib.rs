//! # warden-analytics
//!
//! Pure, read-only aggregation over bus, decision, override, and alert
//! history. Nothing here mutates governance state, so every query is safe
//! to run while signals are still flowing.

pub mod abstention;
pub mod analytics;
pub mod buckets;
pub mod report;
pub mod signals;

pub use abstention::{abstention_trends, AbstentionBucket, AbstentionTrends, CategoryTotals};
pub use analytics::Analytics;
pub use buckets::TimeBucket;
pub use report::GovernanceReport;
pub use signals::{signal_stats, BucketCount, SignalStats};
