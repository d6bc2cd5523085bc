//! [`Analytics`]: the query facade over live component history.

use std::sync::Arc;

use warden_alerting::{AlertSink, AlertStats};
use warden_bus::SignalBus;
use warden_core::traits::Clock;
use warden_gate::ConfidenceGate;
use warden_ledger::{
    BiasScore, ConfidenceTrend, DisagreementPattern, OverrideLedger, OverrideStats,
};

use crate::abstention::{abstention_trends, AbstentionTrends};
use crate::buckets::TimeBucket;
use crate::report::GovernanceReport;
use crate::signals::{signal_stats, SignalStats};

/// Dedup keys listed in reports.
const TOP_SUPPRESSED: usize = 10;
/// Disagreement patterns listed in reports.
const TOP_PATTERNS: usize = 10;
/// Decisions considered by the report's confidence trend.
const REPORT_TREND_WINDOW: usize = 100;

/// Read-only queries. Every method takes a snapshot of the component it
/// reads and aggregates outside any lock.
pub struct Analytics {
    bus: Arc<SignalBus>,
    gate: Arc<ConfidenceGate>,
    ledger: Arc<OverrideLedger>,
    alerts: Arc<AlertSink>,
    clock: Arc<dyn Clock>,
}

impl Analytics {
    pub fn new(
        bus: Arc<SignalBus>,
        gate: Arc<ConfidenceGate>,
        ledger: Arc<OverrideLedger>,
        alerts: Arc<AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bus,
            gate,
            ledger,
            alerts,
            clock,
        }
    }

    pub fn signal_stats(&self, bucket: TimeBucket) -> SignalStats {
        signal_stats(
            &self.bus.history(),
            &self.bus.suppressed_counts(),
            bucket,
            TOP_SUPPRESSED,
        )
    }

    /// Suppressed duplicates per dedup key, most suppressed first.
    pub fn suppressed_counts(&self) -> Vec<(String, u64)> {
        self.bus.suppressed_counts()
    }

    pub fn abstention_trends(&self, bucket: TimeBucket) -> AbstentionTrends {
        abstention_trends(&self.gate.decisions().all(), bucket)
    }

    pub fn override_stats(&self) -> OverrideStats {
        self.ledger.override_stats()
    }

    pub fn bias_score(&self, source: &str) -> BiasScore {
        self.ledger.bias_score(source)
    }

    /// Every known source, highest score first.
    pub fn bias_scores_by_source(&self) -> Vec<BiasScore> {
        let mut scores = self.ledger.bias_scores();
        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.source.cmp(&b.source))
        });
        scores
    }

    pub fn confidence_trend(&self, last_n: usize) -> ConfidenceTrend {
        self.ledger.confidence_trend(last_n)
    }

    pub fn top_disagreements(&self, top_n: usize) -> Vec<DisagreementPattern> {
        self.ledger.disagreement_patterns(top_n)
    }

    pub fn alert_stats(&self) -> AlertStats {
        self.alerts.stats()
    }

    pub fn report(&self, bucket: TimeBucket) -> GovernanceReport {
        GovernanceReport {
            generated_at: self.clock.now(),
            signals: self.signal_stats(bucket),
            decisions: self.gate.stats(),
            abstention: self.abstention_trends(bucket),
            overrides: self.override_stats(),
            bias: self.bias_scores_by_source(),
            confidence_trend: self.confidence_trend(REPORT_TREND_WINDOW),
            top_disagreements: self.top_disagreements(TOP_PATTERNS),
            alerts: self.alert_stats(),
        }
    }
}

impl std::fmt::Debug for Analytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analytics").finish_non_exhaustive()
    }
}
