use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use warden_bus::SignalBus;
use warden_core::config::{BusConfig, GateConfig};
use warden_core::errors::{ConfigError, GovernanceError};
use warden_core::models::{
    AbstainReason, Category, DecisionState, Evidence, Outcome, Severity, Signal, SignalPayload,
    SignalType, ThresholdField,
};
use warden_core::traits::{DisagreementSource, ManualClock, NoDisagreement};
use warden_gate::{ConfidenceGate, DecisionStore, ThresholdRegistry};

struct Harness {
    bus: Arc<SignalBus>,
    thresholds: Arc<ThresholdRegistry>,
    gate: Arc<ConfidenceGate>,
}

fn harness_with(config: GateConfig, disagreement: Arc<dyn DisagreementSource>) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let bus = Arc::new(SignalBus::new(BusConfig::default(), clock.clone()));
    let thresholds = Arc::new(ThresholdRegistry::new(&config));
    let decisions = Arc::new(DecisionStore::new(config.history_capacity));
    let gate = Arc::new(ConfidenceGate::new(
        &config,
        bus.clone(),
        thresholds.clone(),
        disagreement,
        decisions,
        clock,
    ));
    Harness {
        bus,
        thresholds,
        gate,
    }
}

fn harness() -> Harness {
    harness_with(GateConfig::default(), Arc::new(NoDisagreement))
}

fn threat(severity: Severity, confidence: f64, source: &str) -> Signal {
    Signal::builder(
        severity,
        source,
        SignalPayload::ThreatDetected {
            indicator: "wallet-drainer.example".into(),
            target: Some("general".into()),
            evidence: Evidence::default(),
        },
    )
    .confidence(confidence)
    .build()
}

#[test]
fn critical_signal_below_threshold_abstains_and_escalates() {
    let h = harness();
    assert_eq!(h.thresholds.get(Category::Critical).min_confidence, 0.95);

    let signal = threat(Severity::Critical, 0.90, "scanner");
    let decision = h.gate.evaluate(&signal).unwrap();

    assert_eq!(decision.category, Category::Critical);
    assert_eq!(decision.outcome, Outcome::Abstain);
    assert!(decision.reasons.contains(&AbstainReason::LowConfidence));
    assert_eq!(h.gate.state(&decision.id), Some(DecisionState::Abstained));

    let escalations: Vec<Signal> = h
        .bus
        .history()
        .into_iter()
        .filter(|s| s.signal_type == SignalType::EscalationRequired)
        .collect();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].dedup_key, decision.id);
    assert!(matches!(
        &escalations[0].payload,
        SignalPayload::EscalationRequired { decision_id, .. } if *decision_id == decision.id
    ));
}

#[test]
fn confident_security_signal_acts() {
    let h = harness();
    let decision = h.gate.evaluate(&threat(Severity::High, 0.97, "scanner")).unwrap();
    assert_eq!(decision.category, Category::Security);
    assert_eq!(decision.outcome, Outcome::Act);
    assert!(decision.reasons.is_empty());
    assert_eq!(h.gate.state(&decision.id), Some(DecisionState::Acted));
    assert!(h.bus.history().is_empty());
}

#[test]
fn attached_gate_evaluates_detections_only() {
    let h = harness();
    h.gate.attach().unwrap();

    h.bus.emit(threat(Severity::Critical, 0.90, "scanner")).unwrap();
    assert!(h.bus.wait_idle(Duration::from_secs(5)));

    let stats = h.gate.stats();
    assert_eq!(stats.decisions, 1);
    assert_eq!(stats.abstained, 1);
    assert_eq!(stats.escalations_emitted, 1);
    // The escalation it emitted was not evaluated again.
    assert_eq!(h.gate.decisions().len(), 1);
}

#[test]
fn threshold_change_applies_to_later_decisions_only() {
    let h = harness();
    let before = h.gate.evaluate(&threat(Severity::High, 0.80, "a")).unwrap();
    assert_eq!(before.outcome, Outcome::Abstain);

    h.thresholds
        .set_threshold(Category::Security, ThresholdField::MinConfidence, 0.70)
        .unwrap();
    h.thresholds
        .set_threshold(Category::Security, ThresholdField::MaxUncertainty, 0.30)
        .unwrap();
    let after = h.gate.evaluate(&threat(Severity::High, 0.80, "a")).unwrap();
    assert_eq!(after.outcome, Outcome::Act);

    let stored = h.gate.decision(&before.id).unwrap();
    assert_eq!(stored.threshold_snapshot.min_confidence, 0.85);
}

#[test]
fn invalid_threshold_keeps_previous_value() {
    let h = harness();
    let err = h
        .thresholds
        .set_threshold(Category::Moderation, ThresholdField::MinConfidence, 1.2)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "threshold min_confidence must be in [0,1], got 1.2"
    );
    assert!(matches!(
        h.thresholds
            .set_threshold(Category::Moderation, ThresholdField::MinSampleCount, 2.5),
        Err(ConfigError::InvalidSampleCount { .. })
    ));
    assert!(h
        .thresholds
        .set_threshold(Category::Moderation, ThresholdField::MinSampleCount, -1.0)
        .is_err());
    assert_eq!(
        h.thresholds.get(Category::Moderation),
        warden_core::models::Thresholds::default_for(Category::Moderation)
    );
}

#[test]
fn sample_count_defaults_to_signals_seen_from_source() {
    let h = harness();
    h.thresholds
        .set_threshold(Category::Security, ThresholdField::MinSampleCount, 3.0)
        .unwrap();

    let first = h.gate.evaluate(&threat(Severity::High, 0.99, "new")).unwrap();
    let second = h.gate.evaluate(&threat(Severity::High, 0.99, "new")).unwrap();
    let third = h.gate.evaluate(&threat(Severity::High, 0.99, "new")).unwrap();
    assert_eq!(
        [first.sample_count, second.sample_count, third.sample_count],
        [1, 2, 3]
    );
    assert_eq!(first.reasons, vec![AbstainReason::InsufficientSamples]);
    assert_eq!(third.outcome, Outcome::Act);

    let evidence_backed = Signal::builder(
        Severity::High,
        "other",
        SignalPayload::ThreatDetected {
            indicator: "x".into(),
            target: None,
            evidence: Evidence {
                uncertainty: Some(0.01),
                sample_count: Some(12),
            },
        },
    )
    .confidence(0.99)
    .build();
    let decision = h.gate.evaluate(&evidence_backed).unwrap();
    assert_eq!(decision.sample_count, 12);
    assert_eq!(decision.uncertainty, 0.01);
}

#[test]
fn suppressed_duplicates_do_not_count_as_samples() {
    let h = harness();
    h.gate.attach().unwrap();
    for _ in 0..3 {
        let signal = Signal::builder(
            Severity::Low,
            "dup-source",
            SignalPayload::RateLimitExceeded {
                subject_id: "u1".into(),
                count: 40,
                window_secs: 10,
            },
        )
        .confidence(0.9)
        .build();
        h.bus.emit(signal).unwrap();
    }
    assert!(h.bus.wait_idle(Duration::from_secs(5)));
    let decisions = h.gate.decisions().all();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].sample_count, 1);
}

#[test]
fn high_disagreement_source_abstains() {
    struct Disputed;
    impl DisagreementSource for Disputed {
        fn recent_disagreement_rate(&self, source: &str) -> f64 {
            if source == "flaky" {
                0.5
            } else {
                0.0
            }
        }
    }
    let h = harness_with(GateConfig::default(), Arc::new(Disputed));
    let flaky = h.gate.evaluate(&threat(Severity::High, 0.99, "flaky")).unwrap();
    let steady = h.gate.evaluate(&threat(Severity::High, 0.99, "steady")).unwrap();
    assert_eq!(flaky.reasons, vec![AbstainReason::HighDisagreement]);
    assert_eq!(flaky.disagreement_rate, 0.5);
    assert_eq!(steady.outcome, Outcome::Act);
}

#[test]
fn slow_inputs_exceed_deadline_and_record_nothing() {
    struct Slow;
    impl DisagreementSource for Slow {
        fn recent_disagreement_rate(&self, _source: &str) -> f64 {
            std::thread::sleep(Duration::from_millis(50));
            0.0
        }
    }
    let config = GateConfig {
        evaluation_deadline_ms: 5,
        ..GateConfig::default()
    };
    let h = harness_with(config, Arc::new(Slow));
    let result = h.gate.evaluate(&threat(Severity::High, 0.99, "s"));
    assert!(matches!(
        result,
        Err(GovernanceError::DeadlineExceeded { deadline_ms: 5, .. })
    ));
    assert!(h.gate.decisions().is_empty());
    assert_eq!(h.gate.stats().timeouts, 1);
}

#[test]
fn decision_lifecycle_rejects_invalid_transitions() {
    let h = harness();
    let acted = h.gate.evaluate(&threat(Severity::High, 0.99, "s")).unwrap();
    let abstained = h.gate.evaluate(&threat(Severity::High, 0.10, "s")).unwrap();
    let store = h.gate.decisions();

    assert!(matches!(
        store.transition(&acted.id, DecisionState::Escalated),
        Err(GovernanceError::InvalidTransition { .. })
    ));
    assert_eq!(store.state(&acted.id), Some(DecisionState::Acted));

    store
        .transition(&abstained.id, DecisionState::Escalated)
        .unwrap();
    store
        .transition(&abstained.id, DecisionState::Acknowledged)
        .unwrap();
    assert!(store
        .transition(&abstained.id, DecisionState::Expired)
        .is_err());
    assert!(matches!(
        store.transition("dec-missing", DecisionState::Escalated),
        Err(GovernanceError::DecisionNotFound { .. })
    ));
}

#[test]
fn decision_history_is_bounded() {
    let config = GateConfig {
        history_capacity: 2,
        ..GateConfig::default()
    };
    let h = harness_with(config, Arc::new(NoDisagreement));
    let first = h.gate.evaluate(&threat(Severity::High, 0.99, "s")).unwrap();
    h.gate.evaluate(&threat(Severity::High, 0.99, "s")).unwrap();
    h.gate.evaluate(&threat(Severity::High, 0.99, "s")).unwrap();
    assert_eq!(h.gate.decisions().len(), 2);
    assert!(h.gate.decision(&first.id).is_none());
    assert!(h.gate.state(&first.id).is_none());
}

#[test]
fn timed_out_evaluation_does_not_count_as_sample() {
    /// Slow for the first `slow_calls` lookups, then instant.
    struct SlowAtFirst(AtomicU32);
    impl DisagreementSource for SlowAtFirst {
        fn recent_disagreement_rate(&self, _source: &str) -> f64 {
            let left = self.0.load(Ordering::SeqCst);
            if left > 0 {
                self.0.store(left - 1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
            }
            0.0
        }
    }
    let config = GateConfig {
        evaluation_deadline_ms: 5,
        ..GateConfig::default()
    };
    let h = harness_with(config, Arc::new(SlowAtFirst(AtomicU32::new(2))));
    for _ in 0..2 {
        assert!(h.gate.evaluate(&threat(Severity::High, 0.99, "s")).is_err());
    }
    let decision = h.gate.evaluate(&threat(Severity::High, 0.99, "s")).unwrap();
    assert_eq!(decision.sample_count, 1);
    assert_eq!(h.gate.stats().timeouts, 2);
}

#[test]
fn decision_ids_can_be_filtered_by_source() {
    let h = harness();
    let a = h.gate.evaluate(&threat(Severity::High, 0.99, "alpha")).unwrap();
    h.gate.evaluate(&threat(Severity::High, 0.99, "beta")).unwrap();
    let c = h.gate.evaluate(&threat(Severity::High, 0.10, "alpha")).unwrap();

    let ids = h.gate.decisions().ids_where(|d| d.source == "alpha");
    assert_eq!(ids, vec![a.id, c.id]);
}
