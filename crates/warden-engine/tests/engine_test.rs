use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warden_analytics::TimeBucket;
use warden_bus::{EmitOutcome, TopicFilter};
use warden_core::config::WardenConfig;
use warden_core::errors::{
    ConfigError, DeliveryError, GovernanceError, PersistenceError, WardenError,
};
use warden_core::models::{
    AlertRecord, Category, DecisionState, DeliveryStatus, Evidence, HealthStatus, Outcome,
    Severity, Signal, SignalPayload, SignalType, ThresholdField,
};
use warden_core::traits::{ManualClock, Notifier};
use warden_engine::{EngineBuilder, GovernanceEngine};
use warden_ledger::RiskTier;
use warden_storage::MemoryPersistence;

const IDLE: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<AlertRecord>>);

impl RecordingNotifier {
    fn seen(&self) -> Vec<AlertRecord> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, alert: &AlertRecord) -> Result<(), DeliveryError> {
        self.0.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

struct RejectingNotifier(AtomicU32);

impl Notifier for RejectingNotifier {
    fn notify(&self, _alert: &AlertRecord) -> Result<(), DeliveryError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Rejected {
            reason: "webhook revoked".into(),
        })
    }
}

fn builder(notifier: Arc<dyn Notifier>) -> EngineBuilder {
    EngineBuilder::new()
        .notifier(notifier)
        .clock(Arc::new(ManualClock::default()))
        .background_ticker(false)
}

fn engine() -> (GovernanceEngine, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    (builder(notifier.clone()).build().unwrap(), notifier)
}

fn threat(severity: Severity, confidence: f64) -> Signal {
    Signal::builder(
        severity,
        "scanner",
        SignalPayload::ThreatDetected {
            indicator: "wallet-drainer.example".into(),
            target: Some("#general".into()),
            evidence: Evidence::default(),
        },
    )
    .confidence(confidence)
    .build()
}

fn keyed_threat(key: &str) -> Signal {
    Signal::builder(
        Severity::Medium,
        "scanner",
        SignalPayload::ThreatDetected {
            indicator: "wallet-drainer.example".into(),
            target: None,
            evidence: Evidence::default(),
        },
    )
    .confidence(0.90)
    .dedup_key(key)
    .build()
}

fn rate_limit(subject: &str) -> Signal {
    Signal::builder(
        Severity::Low,
        "rate_limiter",
        SignalPayload::RateLimitExceeded {
            subject_id: subject.into(),
            count: 40,
            window_secs: 10,
        },
    )
    .build()
}

fn anomaly(source: &str, key: &str) -> Signal {
    Signal::builder(
        Severity::Medium,
        source,
        SignalPayload::AnomalyDetected {
            metric: "joins_per_minute".into(),
            observed: 30.0,
            baseline: 2.0,
            evidence: Evidence::default(),
        },
    )
    .confidence(0.5)
    .dedup_key(key)
    .build()
}

#[test]
fn duplicate_within_ttl_is_recorded_once() {
    let (engine, _) = engine();
    let first = engine.emit(keyed_threat("k1")).unwrap();
    let second = engine.emit(keyed_threat("k1")).unwrap();
    assert!(first.is_accepted());
    assert!(second.is_suppressed());

    let k1: Vec<Signal> = engine
        .history()
        .into_iter()
        .filter(|s| s.dedup_key == "k1")
        .collect();
    assert_eq!(k1.len(), 1);
    assert_eq!(engine.suppressed_count("k1"), 1);
}

#[test]
fn critical_abstention_escalates_and_alerts() {
    let (engine, notifier) = engine();
    let outcome = engine.emit(threat(Severity::Critical, 0.90)).unwrap();
    let EmitOutcome::Accepted { id, .. } = outcome else {
        panic!("expected acceptance, got {outcome:?}");
    };
    assert!(engine.wait_idle(IDLE));

    let decision = engine.decision_for_signal(&id).expect("decision recorded");
    assert_eq!(decision.category, Category::Critical);
    assert_eq!(decision.outcome, Outcome::Abstain);
    assert_eq!(decision.threshold_snapshot.min_confidence, 0.95);

    let escalation = engine
        .history()
        .into_iter()
        .find(|s| s.signal_type == SignalType::EscalationRequired)
        .expect("escalation emitted");
    assert!(matches!(
        &escalation.payload,
        SignalPayload::EscalationRequired { decision_id, .. } if *decision_id == decision.id
    ));

    let alert = engine
        .alert_for_decision(&decision.id)
        .expect("alert created");
    assert_eq!(alert.delivery, DeliveryStatus::Delivered);
    assert_eq!(notifier.seen().len(), 1);
    assert_eq!(
        engine.decision_state(&decision.id),
        Some(DecisionState::Escalated)
    );

    let acked = engine.acknowledge_alert(&alert.id).unwrap();
    assert!(acked.acknowledged);
    assert_eq!(
        engine.decision_state(&decision.id),
        Some(DecisionState::Acknowledged)
    );
}

#[test]
fn safe_mode_round_trip_restores_advanced_flag() {
    let (engine, _) = engine();
    assert!(engine.is_enabled("advanced_ml_detection"));
    engine.set_safe_mode(true);
    assert!(!engine.is_enabled("advanced_ml_detection"));
    assert!(engine.is_enabled("keyword_detection"));
    engine.set_safe_mode(false);
    assert!(engine.is_enabled("advanced_ml_detection"));
}

#[test]
fn four_overrides_in_ten_decisions_is_high_bias() {
    let (engine, _) = engine();
    for i in 0..10 {
        engine
            .emit(anomaly("anomaly_detector", &format!("burst-{i}")))
            .unwrap();
    }
    assert!(engine.wait_idle(IDLE));

    let decisions: Vec<_> = engine
        .decisions()
        .into_iter()
        .filter(|d| d.source == "anomaly_detector")
        .collect();
    assert_eq!(decisions.len(), 10);
    for decision in &decisions[..4] {
        let human = match decision.outcome {
            Outcome::Act => Outcome::Abstain,
            Outcome::Abstain => Outcome::Act,
        };
        engine
            .log_override(&decision.id, human, "mod-7", "raid confirmed")
            .unwrap();
    }

    let score = engine.bias_score("anomaly_detector");
    assert_eq!(score.score, 0.40);
    assert_eq!(score.tier, RiskTier::High);
    assert_eq!(engine.override_stats().disagreements, 4);
}

#[test]
fn history_capacity_evicts_oldest() {
    let notifier = Arc::new(RecordingNotifier::default());
    let config = WardenConfig::from_toml("[bus]\nhistory_capacity = 3\n").unwrap();
    let engine = builder(notifier).config(config).build().unwrap();

    let ids: Vec<String> = ["a", "b", "c", "d"]
        .iter()
        .map(|subject| match engine.emit(rate_limit(subject)).unwrap() {
            EmitOutcome::Accepted { id, .. } => id,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert!(engine.wait_idle(IDLE));

    let history: Vec<String> = engine.history().into_iter().map(|s| s.id).collect();
    assert_eq!(history, ids[1..].to_vec());
    assert!(engine.signal(&ids[0]).is_none());
}

#[test]
fn flag_gated_signal_type_is_disabled_in_safe_mode() {
    let mut config = WardenConfig::default();
    config
        .bus
        .flag_gates
        .insert(SignalType::AnomalyDetected, "anomaly_detection".into());
    let engine = builder(Arc::new(RecordingNotifier::default()))
        .config(config)
        .build()
        .unwrap();

    engine.set_safe_mode(true);
    let outcome = engine.emit(anomaly("anomaly_detector", "k")).unwrap();
    assert_eq!(
        outcome,
        EmitOutcome::Disabled {
            flag: "anomaly_detection".into()
        }
    );
    assert!(engine.history().is_empty());
}

#[test]
fn invalid_threshold_keeps_previous_value() {
    let (engine, _) = engine();
    let err = engine
        .set_threshold(Category::Critical, ThresholdField::MinConfidence, 1.2)
        .unwrap_err();
    assert!(matches!(err, WardenError::Config(_)));
    assert_eq!(engine.thresholds(Category::Critical).min_confidence, 0.95);

    let updated = engine
        .set_threshold(Category::Critical, ThresholdField::MinConfidence, 0.97)
        .unwrap();
    assert_eq!(updated.min_confidence, 0.97);
}

#[test]
fn unknown_flag_and_override_targets_are_rejected() {
    let (engine, _) = engine();
    assert!(matches!(
        engine.set_flag("no_such_flag", true),
        Err(WardenError::Config(ConfigError::UnknownFlag { .. }))
    ));
    assert!(matches!(
        engine.log_override("dec-missing", Outcome::Act, "mod-1", "n/a"),
        Err(WardenError::Governance(GovernanceError::DecisionNotFound { .. }))
    ));
}

#[test]
fn failing_subscriber_does_not_affect_emitter() {
    let (engine, _) = engine();
    engine
        .subscribe(TopicFilter::All, |_: &Signal| {
            Err(warden_core::errors::SubscriberError::handler("boom"))
        })
        .unwrap();
    assert!(engine.emit(rate_limit("x")).unwrap().is_accepted());
    assert!(engine.wait_idle(IDLE));

    let health = engine.health();
    let bus = health
        .subsystems
        .iter()
        .find(|s| s.name == "bus")
        .unwrap();
    assert_eq!(bus.status, HealthStatus::Degraded);
}

#[test]
fn dropped_alert_degrades_health() {
    let notifier = Arc::new(RejectingNotifier(AtomicU32::new(0)));
    let engine = builder(notifier.clone()).build().unwrap();
    assert_eq!(engine.health().overall_status, HealthStatus::Healthy);

    engine.emit(threat(Severity::Critical, 0.90)).unwrap();
    assert!(engine.wait_idle(IDLE));

    let health = engine.health();
    assert_eq!(health.metrics.alerts_dropped, 1);
    assert_eq!(health.metrics.abstentions, 1);
    assert_eq!(health.overall_status, HealthStatus::Degraded);
    assert!(engine
        .history()
        .iter()
        .any(|s| s.signal_type == SignalType::DroppedAlert));
    assert_eq!(notifier.0.load(Ordering::SeqCst), 1);
}

#[test]
fn state_survives_restart_with_shared_backend() {
    let backend = Arc::new(MemoryPersistence::new());
    let alert_id = {
        let engine = builder(Arc::new(RecordingNotifier::default()))
            .persistence(backend.clone())
            .build()
            .unwrap();
        engine.kill_feature("anomaly_detection").unwrap();
        engine.set_safe_mode(true);
        engine
            .set_threshold(Category::Security, ThresholdField::MinConfidence, 0.9)
            .unwrap();
        engine.emit(threat(Severity::Critical, 0.90)).unwrap();
        assert!(engine.wait_idle(IDLE));
        let decision = engine.decisions().pop().unwrap();
        engine
            .log_override(&decision.id, Outcome::Act, "mod-1", "confirmed")
            .unwrap();
        let alert = engine.alerts().pop().unwrap();
        engine.shutdown();
        alert.id
    };

    let engine = builder(Arc::new(RecordingNotifier::default()))
        .persistence(backend)
        .build()
        .unwrap();
    let flag = engine.flag("anomaly_detection").unwrap();
    assert!(flag.killed);
    assert!(!engine.is_enabled("anomaly_detection"));
    assert!(engine.safe_mode());
    assert_eq!(engine.thresholds(Category::Security).min_confidence, 0.9);
    assert_eq!(engine.overrides().len(), 1);
    assert_eq!(engine.alerts().len(), 1);
    assert_eq!(engine.alerts()[0].id, alert_id);
}

#[test]
fn sqlite_file_is_opened_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = WardenConfig::default();
    config.persistence.db_path = Some(dir.path().join("warden.db").display().to_string());
    config.persistence.flush_interval_ms = 10;

    {
        let engine = builder(Arc::new(RecordingNotifier::default()))
            .config(config.clone())
            .build()
            .unwrap();
        engine.kill_feature("auto_moderation").unwrap();
        assert_eq!(engine.flush(IDLE).unwrap(), 0);
    }

    let engine = builder(Arc::new(RecordingNotifier::default()))
        .config(config)
        .build()
        .unwrap();
    assert!(engine.flag("auto_moderation").unwrap().killed);
    assert_eq!(engine.health().overall_status, HealthStatus::Healthy);
}

#[test]
fn shutdown_is_idempotent_and_closes_writer() {
    let engine = builder(Arc::new(RecordingNotifier::default()))
        .persistence(Arc::new(MemoryPersistence::new()))
        .build()
        .unwrap();
    engine.shutdown();
    engine.shutdown();
    assert!(engine.is_shut_down());
    assert!(matches!(
        engine.flush(IDLE),
        Err(WardenError::Persistence(PersistenceError::QueueClosed))
    ));
}

#[test]
fn in_memory_engine_needs_no_flush() {
    let (engine, _) = engine();
    assert_eq!(engine.flush(IDLE).unwrap(), 0);
    assert_eq!(engine.compact(IDLE).unwrap(), 0);
    let persistence = engine
        .health()
        .subsystems
        .into_iter()
        .find(|s| s.name == "persistence")
        .unwrap();
    assert_eq!(persistence.status, HealthStatus::Healthy);
}

#[test]
fn report_covers_every_section() {
    let (engine, _) = engine();
    engine.emit(threat(Severity::Critical, 0.90)).unwrap();
    engine.emit(rate_limit("u-1")).unwrap();
    assert!(engine.wait_idle(IDLE));

    let report = engine.report(TimeBucket::Hour);
    assert_eq!(report.decisions.decisions, 2);
    assert_eq!(report.decisions.abstained, 1);
    assert_eq!(report.alerts.total, 1);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    for key in ["signals", "decisions", "abstention", "overrides", "alerts"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn builder_rejects_invalid_toml() {
    assert!(matches!(
        EngineBuilder::from_toml("[bus]\nhistory_capacity = 0\n"),
        Err(WardenError::Config(ConfigError::InvalidValue { .. }))
    ));
}

#[test]
fn killed_escalation_alerts_flag_stops_notifications() {
    let (engine, notifier) = engine();
    engine.kill_feature("escalation_alerts").unwrap();
    assert!(!engine.is_enabled("escalation_alerts"));

    let outcome = engine.emit(threat(Severity::Critical, 0.90)).unwrap();
    let EmitOutcome::Accepted { id, .. } = outcome else {
        panic!("expected accepted, got {outcome:?}");
    };
    assert!(engine.wait_idle(IDLE));

    let decision = engine.decision_for_signal(&id).expect("decision recorded");
    assert_eq!(engine.decision_state(&decision.id), Some(DecisionState::Escalated));
    assert!(engine.alerts().is_empty());
    assert!(notifier.seen().is_empty());
}
