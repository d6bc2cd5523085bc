use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use warden_alerting::{AlertSink, Ticker};
use warden_bus::SignalBus;
use warden_core::config::{AlertingConfig, BusConfig, GateConfig};
use warden_core::errors::{DeliveryError, GovernanceError};
use warden_core::models::{
    AlertRecord, AlertTarget, Decision, DecisionState, DeliveryStatus, Evidence, Severity,
    Signal, SignalPayload, SignalType,
};
use warden_core::traits::{
    ManualClock, NoDisagreement, Notifier, PersistedRecord, PersistedState, RecordSink,
};
use warden_flags::{FeatureFlagRegistry, ESCALATION_ALERTS_FLAG};
use warden_gate::{ConfidenceGate, DecisionStore, ThresholdRegistry};

/// Fails the first `failures` calls, then records every alert it sees.
#[derive(Default)]
struct FlakyNotifier {
    failures: AtomicU32,
    seen: Mutex<Vec<AlertRecord>>,
}

impl FlakyNotifier {
    fn failing(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    fn seen(&self) -> Vec<AlertRecord> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for FlakyNotifier {
    fn notify(&self, alert: &AlertRecord) -> Result<(), DeliveryError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(DeliveryError::Unreachable {
                reason: "connection refused".into(),
            });
        }
        self.seen.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

struct RejectingNotifier(AtomicU32);

impl Notifier for RejectingNotifier {
    fn notify(&self, _alert: &AlertRecord) -> Result<(), DeliveryError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Rejected {
            reason: "channel archived".into(),
        })
    }
}

struct SlowNotifier;

impl Notifier for SlowNotifier {
    fn notify(&self, _alert: &AlertRecord) -> Result<(), DeliveryError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    }
}

#[derive(Default)]
struct CollectingSink(Mutex<Vec<PersistedRecord>>);

impl RecordSink for CollectingSink {
    fn submit(&self, record: PersistedRecord) {
        self.0.lock().unwrap().push(record);
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    bus: Arc<SignalBus>,
    gate: Arc<ConfidenceGate>,
    decisions: Arc<DecisionStore>,
    sink: Arc<AlertSink>,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.bus.shutdown();
    }
}

fn fast_config() -> AlertingConfig {
    AlertingConfig {
        max_retries: 2,
        initial_backoff_ms: 0,
        max_backoff_ms: 0,
        delivery_timeout_ms: 1_000,
        ..AlertingConfig::default()
    }
}

fn harness_with(config: AlertingConfig, notifier: Arc<dyn Notifier>) -> Harness {
    harness_flagged(config, notifier, None)
}

fn harness_flagged(
    config: AlertingConfig,
    notifier: Arc<dyn Notifier>,
    flags: Option<Arc<FeatureFlagRegistry>>,
) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let bus = Arc::new(SignalBus::new(BusConfig::default(), clock.clone()));
    let decisions = Arc::new(DecisionStore::new(1_000));
    let gate = Arc::new(ConfidenceGate::new(
        &GateConfig::default(),
        bus.clone(),
        Arc::new(ThresholdRegistry::default()),
        Arc::new(NoDisagreement),
        decisions.clone(),
        clock.clone(),
    ));
    let mut sink = AlertSink::new(config, bus.clone(), decisions.clone(), notifier, clock.clone());
    if let Some(flags) = flags {
        sink = sink.with_flags(flags);
    }
    let sink = Arc::new(sink);
    Harness {
        clock,
        bus,
        gate,
        decisions,
        sink,
    }
}

fn threat(severity: Severity, confidence: f64) -> Signal {
    Signal::builder(
        severity,
        "scanner",
        SignalPayload::ThreatDetected {
            indicator: "wallet-drainer.example".into(),
            target: None,
            evidence: Evidence::default(),
        },
    )
    .confidence(confidence)
    .build()
}

/// Evaluate an abstaining detection and return its decision and the
/// escalation the gate emitted for it.
fn abstain(h: &Harness, severity: Severity) -> (Decision, Signal) {
    let decision = h.gate.evaluate(&threat(severity, 0.50)).unwrap();
    let escalation = h
        .bus
        .history()
        .into_iter()
        .find(|s| s.dedup_key == decision.id)
        .expect("escalation emitted");
    (decision, escalation)
}

fn signals_of(bus: &SignalBus, signal_type: SignalType) -> Vec<Signal> {
    bus.history()
        .into_iter()
        .filter(|s| s.signal_type == signal_type)
        .collect()
}

#[test]
fn abstained_critical_signal_produces_delivered_alert() {
    let notifier = Arc::new(FlakyNotifier::default());
    let h = harness_with(fast_config(), notifier.clone());
    h.gate.attach().unwrap();
    h.sink.attach().unwrap();

    h.bus.emit(threat(Severity::Critical, 0.90)).unwrap();
    assert!(h.bus.wait_idle(Duration::from_secs(5)));

    let decision = h.decisions.recent(1).pop().expect("decision recorded");
    let alert = h
        .sink
        .alert_for_decision(&decision.id)
        .expect("alert created");
    assert!(alert.id.starts_with("alr-"));
    assert_eq!(alert.severity, Severity::Critical);
    assert_eq!(alert.delivery, DeliveryStatus::Delivered);
    assert_eq!(alert.attempts, 1);
    assert!(alert.delivered_at.is_some());
    assert!(!alert.acknowledged);
    assert_eq!(h.decisions.state(&decision.id), Some(DecisionState::Escalated));
    assert_eq!(notifier.seen().len(), 1);
    // The detection awaits acknowledgement; the escalation signal does not.
    assert_eq!(h.sink.stats().awaiting_ack, 1);
}

#[test]
fn delivery_retries_until_notifier_recovers() {
    let notifier = Arc::new(FlakyNotifier::failing(2));
    let h = harness_with(fast_config(), notifier.clone());
    let (_, escalation) = abstain(&h, Severity::High);

    let alert = h.sink.on_escalation(&escalation).unwrap();
    assert_eq!(alert.delivery, DeliveryStatus::Delivered);
    assert_eq!(alert.attempts, 3);
    assert!(signals_of(&h.bus, SignalType::DroppedAlert).is_empty());
}

#[test]
fn exhausted_delivery_drops_alert_and_emits_audit_signal() {
    let h = harness_with(fast_config(), Arc::new(FlakyNotifier::failing(u32::MAX)));
    let (_, escalation) = abstain(&h, Severity::High);

    let alert = h.sink.on_escalation(&escalation).unwrap();
    assert_eq!(alert.delivery, DeliveryStatus::Dropped);
    assert_eq!(alert.attempts, 3);
    assert!(alert.delivered_at.is_none());

    let dropped = signals_of(&h.bus, SignalType::DroppedAlert);
    assert_eq!(dropped.len(), 1);
    match &dropped[0].payload {
        SignalPayload::DroppedAlert {
            alert_id,
            attempts,
            last_error,
        } => {
            assert_eq!(alert_id, &alert.id);
            assert_eq!(*attempts, 3);
            assert!(last_error.contains("connection refused"), "{last_error}");
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(h.sink.dropped_count(), 1);
    assert_eq!(h.sink.stats().dropped, 1);
}

#[test]
fn slow_notifier_counts_as_failed_attempt() {
    let config = AlertingConfig {
        max_retries: 1,
        delivery_timeout_ms: 20,
        ..fast_config()
    };
    let h = harness_with(config, Arc::new(SlowNotifier));
    let (_, escalation) = abstain(&h, Severity::High);

    let alert = h.sink.on_escalation(&escalation).unwrap();
    assert_eq!(alert.delivery, DeliveryStatus::Dropped);
    assert_eq!(alert.attempts, 2);
    let dropped = signals_of(&h.bus, SignalType::DroppedAlert);
    assert!(matches!(
        &dropped[0].payload,
        SignalPayload::DroppedAlert { last_error, .. } if last_error.contains("timed out after 20ms")
    ));
}

#[test]
fn rejected_alert_is_not_retried() {
    let notifier = Arc::new(RejectingNotifier(AtomicU32::new(0)));
    let h = harness_with(fast_config(), notifier.clone());
    let (_, escalation) = abstain(&h, Severity::High);

    let alert = h.sink.on_escalation(&escalation).unwrap();
    assert_eq!(alert.delivery, DeliveryStatus::Dropped);
    assert_eq!(alert.attempts, 1);
    assert_eq!(notifier.0.load(Ordering::SeqCst), 1);
}

#[test]
fn unacknowledged_critical_alert_is_renotified_then_expires() {
    let config = AlertingConfig {
        renotify_timeout_secs: 900,
        max_escalations: 2,
        ..fast_config()
    };
    let notifier = Arc::new(FlakyNotifier::default());
    let h = harness_with(config, notifier.clone());
    let (decision, escalation) = abstain(&h, Severity::Critical);
    let alert = h.sink.on_escalation(&escalation).unwrap();

    assert_eq!(h.sink.tick().renotified, 0);

    for expected in 1..=2 {
        h.clock.advance(ChronoDuration::seconds(901));
        let report = h.sink.tick();
        assert_eq!(report.renotified, 1);
        assert_eq!(h.sink.get(&alert.id).unwrap().escalation_count, expected);
    }
    assert_eq!(notifier.seen().len(), 3);

    h.clock.advance(ChronoDuration::seconds(901));
    let report = h.sink.tick();
    assert_eq!(report.renotified, 0);
    assert_eq!(report.expired, 1);
    assert_eq!(h.decisions.state(&decision.id), Some(DecisionState::Expired));

    let expired = signals_of(&h.bus, SignalType::DecisionExpired);
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].dedup_key, format!("{}:expired", decision.id));

    // Nothing further happens once expired.
    assert!(h.sink.get(&alert.id).unwrap().closed);
    h.clock.advance(ChronoDuration::seconds(901));
    assert_eq!(h.sink.tick(), Default::default());

    let stats = h.sink.stats();
    assert_eq!(stats.escalations, 2);
    assert_eq!(stats.expired, 1);
}

#[test]
fn acknowledged_alert_stops_renotification() {
    let h = harness_with(fast_config(), Arc::new(FlakyNotifier::default()));
    let (decision, escalation) = abstain(&h, Severity::Critical);
    let alert = h.sink.on_escalation(&escalation).unwrap();

    let acked = h.sink.acknowledge_alert(&alert.id).unwrap();
    assert!(acked.acknowledged);
    assert_eq!(
        h.decisions.state(&decision.id),
        Some(DecisionState::Acknowledged)
    );

    h.clock.advance(ChronoDuration::hours(2));
    assert_eq!(h.sink.tick().renotified, 0);
    // Acknowledging twice is harmless.
    assert!(h.sink.acknowledge_alert(&alert.id).is_ok());
}

#[test]
fn high_severity_alerts_are_not_renotified() {
    let h = harness_with(fast_config(), Arc::new(FlakyNotifier::default()));
    let (_, escalation) = abstain(&h, Severity::High);
    let alert = h.sink.on_escalation(&escalation).unwrap();
    assert_eq!(alert.severity, Severity::High);

    h.clock.advance(ChronoDuration::hours(2));
    assert_eq!(h.sink.tick().renotified, 0);
}

#[test]
fn overridden_decision_is_not_renotified() {
    let h = harness_with(fast_config(), Arc::new(FlakyNotifier::default()));
    let (decision, escalation) = abstain(&h, Severity::Critical);
    h.sink.on_escalation(&escalation).unwrap();
    h.decisions
        .transition(&decision.id, DecisionState::Overridden)
        .unwrap();

    h.clock.advance(ChronoDuration::hours(2));
    let report = h.sink.tick();
    assert_eq!(report.renotified, 0);
    assert_eq!(report.expired, 0);
}

#[test]
fn escalation_for_resolved_decision_is_skipped() {
    let notifier = Arc::new(FlakyNotifier::default());
    let h = harness_with(fast_config(), notifier.clone());
    let (decision, escalation) = abstain(&h, Severity::High);
    h.decisions
        .transition(&decision.id, DecisionState::Overridden)
        .unwrap();

    assert!(h.sink.on_escalation(&escalation).is_none());
    assert!(h.sink.alerts().is_empty());
    assert!(notifier.seen().is_empty());
}

#[test]
fn unacknowledged_high_signal_raises_alert_after_ttl() {
    let h = harness_with(fast_config(), Arc::new(FlakyNotifier::default()));
    let signal = threat(Severity::High, 0.99);
    h.sink.track_signal(&signal);
    h.sink.track_signal(&threat(Severity::Medium, 0.99));
    assert_eq!(h.sink.stats().awaiting_ack, 1);

    h.clock.advance(ChronoDuration::seconds(299));
    assert_eq!(h.sink.tick().signal_alerts, 0);

    h.clock.advance(ChronoDuration::seconds(2));
    assert_eq!(h.sink.tick().signal_alerts, 1);
    let alerts = h.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].target, AlertTarget::Signal(signal.id.clone()));

    h.sink.acknowledge_signal(&signal.id).unwrap();
    assert!(h.sink.get(&alerts[0].id).unwrap().acknowledged);
    assert_eq!(h.sink.tick().signal_alerts, 0);
}

#[test]
fn acknowledged_signal_never_alerts() {
    let h = harness_with(fast_config(), Arc::new(FlakyNotifier::default()));
    let signal = threat(Severity::Critical, 0.99);
    h.sink.track_signal(&signal);
    h.sink.acknowledge_signal(&signal.id).unwrap();

    h.clock.advance(ChronoDuration::hours(1));
    assert_eq!(h.sink.tick().signal_alerts, 0);
    assert!(h.sink.alerts().is_empty());
}

#[test]
fn acknowledging_unknown_ids_fails() {
    let h = harness_with(fast_config(), Arc::new(FlakyNotifier::default()));
    assert!(matches!(
        h.sink.acknowledge_alert("alr-missing"),
        Err(GovernanceError::AlertNotFound { .. })
    ));
    assert!(matches!(
        h.sink.acknowledge_signal("sig-missing"),
        Err(GovernanceError::AlertNotFound { .. })
    ));
}

#[test]
fn alert_changes_are_persisted_and_restored() {
    let collected = Arc::new(CollectingSink::default());
    let clock = Arc::new(ManualClock::default());
    let bus = Arc::new(SignalBus::new(BusConfig::default(), clock.clone()));
    let decisions = Arc::new(DecisionStore::new(100));
    let gate = ConfidenceGate::new(
        &GateConfig::default(),
        bus.clone(),
        Arc::new(ThresholdRegistry::default()),
        Arc::new(NoDisagreement),
        decisions.clone(),
        clock.clone(),
    );
    let sink = AlertSink::new(
        fast_config(),
        bus.clone(),
        decisions.clone(),
        Arc::new(FlakyNotifier::default()),
        clock.clone(),
    )
    .with_sink(collected.clone());

    let decision = gate.evaluate(&threat(Severity::High, 0.5)).unwrap();
    let escalation = bus
        .history()
        .into_iter()
        .find(|s| s.dedup_key == decision.id)
        .unwrap();
    let alert = sink.on_escalation(&escalation).unwrap();
    sink.acknowledge_alert(&alert.id).unwrap();

    let records = collected.0.lock().unwrap().clone();
    assert_eq!(records.len(), 2);
    let state = PersistedState::replay(records);
    assert_eq!(state.alerts.len(), 1);
    assert!(state.alerts[0].acknowledged);

    let restored = AlertSink::new(
        fast_config(),
        bus,
        decisions,
        Arc::new(FlakyNotifier::default()),
        clock,
    );
    restored.load_from(&state);
    assert_eq!(restored.get(&alert.id), Some(state.alerts[0].clone()));
}

#[test]
fn ticker_sweeps_in_background() {
    let config = AlertingConfig {
        signal_ack_ttl_secs: 0,
        ..fast_config()
    };
    let h = harness_with(config, Arc::new(FlakyNotifier::default()));
    h.sink.track_signal(&threat(Severity::Critical, 0.99));

    let mut ticker = Ticker::start(h.sink.clone(), Duration::from_millis(5)).unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while h.sink.alerts().is_empty() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    ticker.stop();
    assert_eq!(h.sink.alerts().len(), 1);
}

#[test]
fn killed_escalation_alerts_flag_suppresses_delivery() {
    let flags = Arc::new(FeatureFlagRegistry::with_defaults());
    let notifier = Arc::new(FlakyNotifier::default());
    let h = harness_flagged(fast_config(), notifier.clone(), Some(flags.clone()));
    flags.kill_feature(ESCALATION_ALERTS_FLAG).unwrap();

    let (decision, escalation) = abstain(&h, Severity::Critical);
    assert!(h.sink.on_escalation(&escalation).is_none());
    assert!(h.sink.alerts().is_empty());
    assert!(notifier.seen().is_empty());
    assert_eq!(h.decisions.state(&decision.id), Some(DecisionState::Escalated));

    flags.restore_flag(ESCALATION_ALERTS_FLAG).unwrap();
    let (_, escalation) = abstain(&h, Severity::Critical);
    assert!(h.sink.on_escalation(&escalation).is_some());
    assert_eq!(notifier.seen().len(), 1);
}

#[test]
fn closed_alert_is_persisted_and_stays_closed_after_restore() {
    let collected = Arc::new(CollectingSink::default());
    let config = AlertingConfig {
        max_escalations: 0,
        ..fast_config()
    };
    let h = harness_with(config.clone(), Arc::new(FlakyNotifier::default()));
    let sink = AlertSink::new(
        config.clone(),
        h.bus.clone(),
        h.decisions.clone(),
        Arc::new(FlakyNotifier::default()),
        h.clock.clone(),
    )
    .with_sink(collected.clone());
    let (_, escalation) = abstain(&h, Severity::Critical);
    let alert = sink.on_escalation(&escalation).unwrap();

    h.clock.advance(ChronoDuration::seconds(901));
    assert_eq!(sink.tick().expired, 1);

    let state = PersistedState::replay(collected.0.lock().unwrap().clone());
    assert!(state.alerts[0].closed);

    let notifier = Arc::new(FlakyNotifier::default());
    let restored = AlertSink::new(
        config,
        h.bus.clone(),
        h.decisions.clone(),
        notifier.clone(),
        h.clock.clone(),
    );
    restored.load_from(&state);
    h.clock.advance(ChronoDuration::seconds(901));
    assert_eq!(restored.tick(), Default::default());
    assert!(notifier.seen().is_empty());
    assert_eq!(restored.get(&alert.id).map(|a| a.closed), Some(true));
}

#[test]
fn ack_tracking_is_bounded_by_history_capacity() {
    let config = AlertingConfig {
        history_capacity: 3,
        ..fast_config()
    };
    let h = harness_with(config, Arc::new(FlakyNotifier::default()));
    let signals: Vec<Signal> = (0..5).map(|_| threat(Severity::High, 0.99)).collect();
    for signal in &signals {
        h.sink.track_signal(signal);
    }
    assert_eq!(h.sink.stats().awaiting_ack, 3);
    assert!(matches!(
        h.sink.acknowledge_signal(&signals[0].id),
        Err(GovernanceError::AlertNotFound { .. })
    ));
    assert!(h.sink.acknowledge_signal(&signals[4].id).is_ok());
    assert_eq!(h.sink.stats().awaiting_ack, 2);
}
