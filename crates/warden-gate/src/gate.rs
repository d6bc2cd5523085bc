//! [`ConfidenceGate`]: turns detections into decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_bus::{SignalBus, SubscriptionHandle, TopicFilter};
use warden_core::config::GateConfig;
use warden_core::constants::{DECISION_ID_PREFIX, GOVERNANCE_SOURCE};
use warden_core::errors::{GovernanceError, SubscriberError};
use warden_core::models::{
    Category, Decision, DecisionState, Outcome, Signal, SignalPayload, SignalType,
};
use warden_core::traits::{Clock, DisagreementSource};
use warden_observability::tracing_setup::events;

use crate::policy::{evaluate_policy, GateInput};
use crate::store::DecisionStore;
use crate::thresholds::ThresholdRegistry;

/// Point-in-time gate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    pub decisions: u64,
    pub acted: u64,
    pub abstained: u64,
    pub timeouts: u64,
    pub escalations_emitted: u64,
}

#[derive(Debug, Default)]
struct GateCounters {
    acted: AtomicU64,
    abstained: AtomicU64,
    timeouts: AtomicU64,
    escalations: AtomicU64,
}

/// The abstention policy bound to a bus.
pub struct ConfidenceGate {
    bus: Arc<SignalBus>,
    thresholds: Arc<ThresholdRegistry>,
    disagreement: Arc<dyn DisagreementSource>,
    decisions: Arc<DecisionStore>,
    clock: Arc<dyn Clock>,
    /// Signals evaluated per source, used when a detection carries no
    /// sample count of its own.
    samples: DashMap<String, u32>,
    deadline: Duration,
    counters: GateCounters,
}

impl ConfidenceGate {
    pub fn new(
        config: &GateConfig,
        bus: Arc<SignalBus>,
        thresholds: Arc<ThresholdRegistry>,
        disagreement: Arc<dyn DisagreementSource>,
        decisions: Arc<DecisionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bus,
            thresholds,
            disagreement,
            decisions,
            clock,
            samples: DashMap::new(),
            deadline: Duration::from_millis(config.evaluation_deadline_ms),
            counters: GateCounters::default(),
        }
    }

    /// Subscribe to detection signals. The gate never sees its own
    /// escalations or the alert sink's audit signals.
    pub fn attach(self: &Arc<Self>) -> Result<SubscriptionHandle, SubscriberError> {
        let gate = Arc::clone(self);
        self.bus.subscribe_named(
            "confidence-gate",
            TopicFilter::types(SignalType::DETECTIONS),
            move |signal: &Signal| match gate.evaluate(signal) {
                Ok(_) | Err(GovernanceError::DeadlineExceeded { .. }) => Ok(()),
                Err(e) => Err(SubscriberError::handler(e.to_string())),
            },
        )
    }

    /// Evaluate one signal, record the decision, and escalate on ABSTAIN.
    pub fn evaluate(&self, signal: &Signal) -> Result<Decision, GovernanceError> {
        let started = Instant::now();
        let category = Category::for_signal(signal);
        let thresholds = self.thresholds.get(category);
        let mut input = self.gather_inputs(signal);

        if started.elapsed() > self.deadline {
            let deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX);
            self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
            events::evaluation_timed_out(&signal.id, deadline_ms);
            return Err(GovernanceError::DeadlineExceeded {
                signal_id: signal.id.clone(),
                deadline_ms,
            });
        }

        self.count_sample(signal, &mut input);
        let verdict = evaluate_policy(&input, &thresholds);
        let decision = Decision {
            id: format!("{}-{}", DECISION_ID_PREFIX, Uuid::new_v4()),
            signal_id: signal.id.clone(),
            source: signal.source.clone(),
            signal_type: signal.signal_type,
            category,
            confidence_snapshot: input.confidence,
            uncertainty: input.uncertainty,
            sample_count: input.sample_count,
            disagreement_rate: input.disagreement_rate,
            threshold_snapshot: thresholds,
            outcome: verdict.outcome,
            reasons: verdict.reasons,
            created_at: self.clock.now(),
        };
        self.decisions.record(decision.clone());
        events::decision_made(
            &decision.id,
            &decision.signal_id,
            category.as_str(),
            decision.outcome.as_str(),
        );

        match decision.outcome {
            Outcome::Act => {
                self.counters.acted.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Abstain => {
                self.counters.abstained.fetch_add(1, Ordering::Relaxed);
                self.escalate(signal, &decision);
            }
        }
        Ok(decision)
    }

    /// Inputs for one evaluation. The per-source sample count is only
    /// previewed here; [`Self::count_sample`] commits it.
    fn gather_inputs(&self, signal: &Signal) -> GateInput {
        let seen = self.samples.get(&signal.source).map_or(0, |count| *count);
        let sample_count = evidence_samples(signal).unwrap_or(seen.saturating_add(1));
        GateInput {
            confidence: signal.confidence,
            uncertainty: signal.uncertainty(),
            sample_count,
            disagreement_rate: self.disagreement.recent_disagreement_rate(&signal.source),
        }
    }

    fn count_sample(&self, signal: &Signal, input: &mut GateInput) {
        let evaluated = {
            let mut count = self.samples.entry(signal.source.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        if evidence_samples(signal).is_none() {
            input.sample_count = evaluated;
        }
    }

    /// Re-emit the abstention as `ESCALATION_REQUIRED`, keyed by decision id.
    fn escalate(&self, signal: &Signal, decision: &Decision) {
        let escalation = Signal::builder(
            signal.severity,
            GOVERNANCE_SOURCE,
            SignalPayload::EscalationRequired {
                decision_id: decision.id.clone(),
                category: decision.category,
                reasons: decision.reasons.clone(),
            },
        )
        .dedup_key(decision.id.clone())
        .correlation_id(
            signal
                .correlation_id
                .clone()
                .unwrap_or_else(|| signal.id.clone()),
        )
        .timestamp(self.clock.now())
        .build();

        if self.bus.emit(escalation).is_ok() {
            self.counters.escalations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn decisions(&self) -> &Arc<DecisionStore> {
        &self.decisions
    }

    pub fn decision(&self, decision_id: &str) -> Option<Decision> {
        self.decisions.get(decision_id)
    }

    pub fn state(&self, decision_id: &str) -> Option<DecisionState> {
        self.decisions.state(decision_id)
    }

    pub fn thresholds(&self) -> &Arc<ThresholdRegistry> {
        &self.thresholds
    }

    pub fn stats(&self) -> GateStats {
        let acted = self.counters.acted.load(Ordering::Relaxed);
        let abstained = self.counters.abstained.load(Ordering::Relaxed);
        GateStats {
            decisions: acted + abstained,
            acted,
            abstained,
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            escalations_emitted: self.counters.escalations.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ConfidenceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidenceGate")
            .field("deadline", &self.deadline)
            .field("stats", &self.stats())
            .finish()
    }
}

fn evidence_samples(signal: &Signal) -> Option<u32> {
    signal.payload.evidence().and_then(|e| e.sample_count)
}
