//! [`OverrideLedger`]: append-only override log and its queries.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_core::config::LedgerConfig;
use warden_core::constants::OVERRIDE_ID_PREFIX;
use warden_core::errors::{GovernanceError, ValidationError, WardenResult};
use warden_core::history::BoundedHistory;
use warden_core::models::{DecisionState, Outcome, OverrideRecord};
use warden_core::traits::{Clock, DisagreementSource, PersistedRecord, PersistedState, RecordSink};
use warden_gate::DecisionStore;
use warden_observability::tracing_setup::events;

use crate::bias::BiasScore;
use crate::trend::{compute_trend, ConfidenceTrend};

/// Windows longer than a century are clamped.
const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 3600;

/// A frequently recurring `(source, reason)` disagreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisagreementPattern {
    pub source: String,
    pub reason: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideStats {
    pub total: u64,
    pub disagreements: u64,
    pub agreements: u64,
    /// Fraction of overrides where the human agreed. 1.0 with no overrides.
    pub agreement_rate: f64,
    pub by_reviewer: BTreeMap<String, u64>,
    pub by_source: BTreeMap<String, u64>,
}

/// Override log bound to the gate's decision store.
pub struct OverrideLedger {
    config: LedgerConfig,
    decisions: Arc<DecisionStore>,
    records: RwLock<BoundedHistory<OverrideRecord>>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn RecordSink>>,
}

impl OverrideLedger {
    pub fn new(config: LedgerConfig, decisions: Arc<DecisionStore>, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.history_capacity;
        Self {
            config,
            decisions,
            records: RwLock::new(BoundedHistory::new(capacity)),
            clock,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Append an override. The decision must exist and the reviewer must be
    /// named. An abstained or escalated decision moves to `Overridden`.
    pub fn log(
        &self,
        decision_id: &str,
        automated_outcome: Outcome,
        human_outcome: Outcome,
        reviewer_id: &str,
        reason: &str,
    ) -> WardenResult<OverrideRecord> {
        if reviewer_id.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "reviewer_id",
            }
            .into());
        }
        let decision =
            self.decisions
                .get(decision_id)
                .ok_or_else(|| GovernanceError::DecisionNotFound {
                    id: decision_id.to_string(),
                })?;

        let record = OverrideRecord {
            id: format!("{}-{}", OVERRIDE_ID_PREFIX, Uuid::new_v4()),
            decision_id: decision_id.to_string(),
            source: decision.source.clone(),
            automated_outcome,
            human_outcome,
            reviewer_id: reviewer_id.to_string(),
            reason: reason.to_string(),
            timestamp: self.clock.now(),
        };

        // Acted decisions keep their state; the override is still logged.
        let _ = self
            .decisions
            .transition(decision_id, DecisionState::Overridden);

        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        events::override_logged(decision_id, reviewer_id, record.is_disagreement());
        if let Some(sink) = &self.sink {
            sink.submit(PersistedRecord::Override(record.clone()));
        }
        Ok(record)
    }

    /// [`log`](Self::log) with the automated outcome taken from the decision.
    pub fn log_override(
        &self,
        decision_id: &str,
        human_outcome: Outcome,
        reviewer_id: &str,
        reason: &str,
    ) -> WardenResult<OverrideRecord> {
        let automated = self
            .decisions
            .get(decision_id)
            .map(|d| d.outcome)
            .ok_or_else(|| GovernanceError::DecisionNotFound {
                id: decision_id.to_string(),
            })?;
        self.log(decision_id, automated, human_outcome, reviewer_id, reason)
    }

    /// Restore persisted override records. Nothing is re-appended.
    pub fn load_from(&self, state: &PersistedState) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        for record in &state.overrides {
            records.push(record.clone());
        }
    }

    pub fn records(&self) -> Vec<OverrideRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bias score over the configured window.
    pub fn bias_score(&self, source: &str) -> BiasScore {
        self.bias_score_within(source, Duration::seconds(self.window_secs()))
    }

    /// `disagreements / total_decisions` for `source` over `window`. Each
    /// decision counts at most once however often it was overridden.
    pub fn bias_score_within(&self, source: &str, window: Duration) -> BiasScore {
        let now = self.clock.now();
        let since = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut decided: HashSet<String> = self
            .decisions
            .ids_where(|d| d.source == source && d.created_at >= since)
            .into_iter()
            .collect();
        let disputed: HashSet<String> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.timestamp >= since && r.source == source && r.is_disagreement())
            .map(|r| r.decision_id.clone())
            .collect();
        // Disputed decisions may have been evicted from decision history.
        decided.extend(disputed.iter().cloned());

        let window_secs = u64::try_from(window.num_seconds()).unwrap_or(0);
        BiasScore::new(
            source,
            window_secs,
            decided.len() as u64,
            disputed.len() as u64,
        )
    }

    /// Bias scores for every source seen in decisions or overrides.
    pub fn bias_scores(&self) -> Vec<BiasScore> {
        let mut sources: Vec<String> = self
            .decisions
            .all()
            .into_iter()
            .map(|d| d.source)
            .chain(self.records().into_iter().map(|r| r.source))
            .collect();
        sources.sort();
        sources.dedup();
        sources.iter().map(|s| self.bias_score(s)).collect()
    }

    /// The `top_n` most frequent `(source, reason)` disagreement pairs.
    pub fn disagreement_patterns(&self, top_n: usize) -> Vec<DisagreementPattern> {
        let mut counts: HashMap<(String, String), u64> = HashMap::new();
        for record in self.records().into_iter().filter(|r| r.is_disagreement()) {
            *counts.entry((record.source, record.reason)).or_insert(0) += 1;
        }
        let mut patterns: Vec<DisagreementPattern> = counts
            .into_iter()
            .map(|((source, reason), count)| DisagreementPattern {
                source,
                reason,
                count,
            })
            .collect();
        patterns.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.reason.cmp(&b.reason))
        });
        patterns.truncate(top_n);
        patterns
    }

    /// Trend of the last `last_n` decisions' confidence snapshots.
    pub fn confidence_trend(&self, last_n: usize) -> ConfidenceTrend {
        let values: Vec<f64> = self
            .decisions
            .recent(last_n)
            .iter()
            .map(|d| d.confidence_snapshot)
            .collect();
        compute_trend(&values, self.config.trend_sma_window, self.config.trend_dead_band)
    }

    /// Same as [`confidence_trend`](Self::confidence_trend), for one source.
    pub fn confidence_trend_for(&self, source: &str, last_n: usize) -> ConfidenceTrend {
        let values: Vec<f64> = self
            .decisions
            .all()
            .iter()
            .filter(|d| d.source == source)
            .map(|d| d.confidence_snapshot)
            .collect();
        let skip = values.len().saturating_sub(last_n);
        compute_trend(
            &values[skip..],
            self.config.trend_sma_window,
            self.config.trend_dead_band,
        )
    }

    pub fn override_stats(&self) -> OverrideStats {
        let records = self.records();
        let mut stats = OverrideStats {
            total: records.len() as u64,
            ..OverrideStats::default()
        };
        for record in &records {
            if record.is_disagreement() {
                stats.disagreements += 1;
            } else {
                stats.agreements += 1;
            }
            *stats.by_reviewer.entry(record.reviewer_id.clone()).or_insert(0) += 1;
            *stats.by_source.entry(record.source.clone()).or_insert(0) += 1;
        }
        stats.agreement_rate = if stats.total == 0 {
            1.0
        } else {
            stats.agreements as f64 / stats.total as f64
        };
        stats
    }

    fn window_secs(&self) -> i64 {
        i64::try_from(self.config.bias_window_secs.min(MAX_WINDOW_SECS)).unwrap_or(0)
    }
}

impl DisagreementSource for OverrideLedger {
    fn recent_disagreement_rate(&self, source: &str) -> f64 {
        self.bias_score(source).score
    }
}

impl std::fmt::Debug for OverrideLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideLedger")
            .field("records", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
