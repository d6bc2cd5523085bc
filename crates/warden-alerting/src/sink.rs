//! [`AlertSink`]: builds, delivers, re-notifies, and expires alerts.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_bus::{SignalBus, SubscriptionHandle, TopicFilter};
use warden_core::config::AlertingConfig;
use warden_core::constants::{ALERT_ID_PREFIX, GOVERNANCE_SOURCE};
use warden_core::errors::{GovernanceError, SubscriberError};
use warden_core::history::BoundedHistory;
use warden_core::models::{
    AlertRecord, AlertTarget, DecisionState, DeliveryStatus, Severity, Signal, SignalPayload,
    SignalType,
};
use warden_core::traits::{Clock, Notifier, PersistedRecord, PersistedState, RecordSink};
use warden_flags::{FeatureFlagRegistry, ESCALATION_ALERTS_FLAG};
use warden_gate::DecisionStore;
use warden_observability::tracing_setup::events;

use crate::delivery::{deliver, DeliveryPolicy};

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Alerts raised for HIGH/CRITICAL signals past their ack TTL.
    pub signal_alerts: u64,
    pub renotified: u64,
    pub expired: u64,
}

/// Aggregate view over retained alerts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: u64,
    pub pending: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub acknowledged: u64,
    /// Sum of re-notifications across alerts.
    pub escalations: u64,
    pub expired: u64,
    pub by_severity: BTreeMap<Severity, u64>,
    /// HIGH/CRITICAL signals still waiting for acknowledgement.
    pub awaiting_ack: u64,
}

/// A HIGH/CRITICAL signal not yet acknowledged.
#[derive(Debug, Clone)]
struct AwaitingAck {
    signal_id: String,
    severity: Severity,
    seen_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SinkCounters {
    dropped: AtomicU64,
    expired: AtomicU64,
}

/// The alerting and escalation sink.
pub struct AlertSink {
    config: AlertingConfig,
    policy: DeliveryPolicy,
    bus: Arc<SignalBus>,
    decisions: Arc<DecisionStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    alerts: Mutex<BoundedHistory<AlertRecord>>,
    /// Bounded by `history_capacity`; the oldest entry gives way.
    awaiting_ack: Mutex<VecDeque<AwaitingAck>>,
    flags: Option<Arc<FeatureFlagRegistry>>,
    sink: Option<Arc<dyn RecordSink>>,
    counters: SinkCounters,
}

impl AlertSink {
    pub fn new(
        config: AlertingConfig,
        bus: Arc<SignalBus>,
        decisions: Arc<DecisionStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy: DeliveryPolicy::from_config(&config),
            alerts: Mutex::new(BoundedHistory::new(config.history_capacity)),
            config,
            bus,
            decisions,
            notifier,
            clock,
            awaiting_ack: Mutex::new(VecDeque::new()),
            flags: None,
            sink: None,
            counters: SinkCounters::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Honor the `escalation_alerts` kill switch.
    pub fn with_flags(mut self, flags: Arc<FeatureFlagRegistry>) -> Self {
        self.flags = Some(flags);
        self
    }

    fn escalation_alerts_enabled(&self) -> bool {
        self.flags
            .as_ref()
            .map_or(true, |flags| flags.is_enabled(ESCALATION_ALERTS_FLAG))
    }

    /// Subscribe to escalations and to HIGH/CRITICAL detections.
    pub fn attach(self: &Arc<Self>) -> Result<Vec<SubscriptionHandle>, SubscriberError> {
        let escalations = {
            let sink = Arc::clone(self);
            self.bus.subscribe_named(
                "alert-sink.escalations",
                TopicFilter::types([SignalType::EscalationRequired]),
                move |signal: &Signal| {
                    sink.on_escalation(signal);
                    Ok(())
                },
            )?
        };
        let high_severity = {
            let sink = Arc::clone(self);
            self.bus.subscribe_named(
                "alert-sink.high-severity",
                TopicFilter::MinSeverity(Severity::High),
                move |signal: &Signal| {
                    sink.track_signal(signal);
                    Ok(())
                },
            )?
        };
        Ok(vec![escalations, high_severity])
    }

    /// Handle an `ESCALATION_REQUIRED` signal: mark the decision escalated
    /// and alert on it. Decisions already resolved are not alerted, and no
    /// alert is raised while `escalation_alerts` is off.
    pub fn on_escalation(&self, signal: &Signal) -> Option<AlertRecord> {
        let SignalPayload::EscalationRequired { decision_id, .. } = &signal.payload else {
            return None;
        };
        if let Err(e) = self
            .decisions
            .transition(decision_id, DecisionState::Escalated)
        {
            tracing::debug!(decision_id = %decision_id, error = %e, "escalation skipped");
            return None;
        }
        if !self.escalation_alerts_enabled() {
            tracing::info!(
                decision_id = %decision_id,
                flag = ESCALATION_ALERTS_FLAG,
                "escalation alert suppressed by flag"
            );
            return None;
        }
        Some(self.raise(AlertTarget::Decision(decision_id.clone()), signal.severity))
    }

    /// Start the ack clock for a HIGH/CRITICAL detection.
    pub fn track_signal(&self, signal: &Signal) {
        if !signal.severity.is_high() || signal.signal_type.is_governance() {
            return;
        }
        let mut awaiting = self.awaiting_ack.lock().unwrap_or_else(PoisonError::into_inner);
        if awaiting.len() >= self.config.history_capacity.max(1) {
            if let Some(oldest) = awaiting.pop_front() {
                tracing::warn!(
                    signal_id = %oldest.signal_id,
                    "ack tracking full, oldest signal no longer tracked"
                );
            }
        }
        awaiting.push_back(AwaitingAck {
            signal_id: signal.id.clone(),
            severity: signal.severity,
            seen_at: self.clock.now(),
        });
    }

    /// Build, deliver, and store a new alert.
    fn raise(&self, target: AlertTarget, severity: Severity) -> AlertRecord {
        let now = self.clock.now();
        let mut alert = AlertRecord::new(
            format!("{}-{}", ALERT_ID_PREFIX, Uuid::new_v4()),
            target,
            severity,
            now,
        );
        self.dispatch(&mut alert);
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert.clone());
        self.persist(&alert);
        alert
    }

    /// Run the retry loop and record its outcome on `alert`. On final failure
    /// the alert is dropped and a `DROPPED_ALERT` signal is emitted.
    fn dispatch(&self, alert: &mut AlertRecord) {
        let report = deliver(&self.notifier, alert, &self.policy);
        alert.attempts += report.attempts;
        let now = self.clock.now();
        alert.last_notified_at = Some(now);
        match report.result {
            Ok(()) => {
                alert.delivery = DeliveryStatus::Delivered;
                alert.delivered_at.get_or_insert(now);
                events::alert_delivered(&alert.id, alert.attempts, alert.escalation_count);
            }
            Err(e) => {
                alert.delivery = DeliveryStatus::Dropped;
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                events::alert_dropped(&alert.id, alert.attempts, &e.to_string());
                let dropped = Signal::builder(
                    Severity::High,
                    GOVERNANCE_SOURCE,
                    SignalPayload::DroppedAlert {
                        alert_id: alert.id.clone(),
                        attempts: alert.attempts,
                        last_error: e.to_string(),
                    },
                )
                .dedup_key(format!("{}:dropped", alert.id))
                .timestamp(now)
                .build();
                let _ = self.bus.emit(dropped);
            }
        }
    }

    /// Acknowledge an alert. A decision alert moves its decision to
    /// `Acknowledged`.
    pub fn acknowledge_alert(&self, alert_id: &str) -> Result<AlertRecord, GovernanceError> {
        let alert = {
            let mut alerts = self.alerts.lock().unwrap_or_else(PoisonError::into_inner);
            let alert = alerts
                .find_mut(|a| a.id == alert_id)
                .ok_or_else(|| GovernanceError::AlertNotFound {
                    id: alert_id.to_string(),
                })?;
            if alert.acknowledged {
                return Ok(alert.clone());
            }
            alert.acknowledged = true;
            alert.clone()
        };
        if let Some(decision_id) = alert.decision_id() {
            let _ = self
                .decisions
                .transition(decision_id, DecisionState::Acknowledged);
        }
        self.persist(&alert);
        Ok(alert)
    }

    /// Acknowledge a HIGH/CRITICAL signal, stopping its ack clock and
    /// acknowledging any alert already raised for it.
    pub fn acknowledge_signal(&self, signal_id: &str) -> Result<(), GovernanceError> {
        let was_waiting = {
            let mut awaiting = self.awaiting_ack.lock().unwrap_or_else(PoisonError::into_inner);
            let before = awaiting.len();
            awaiting.retain(|a| a.signal_id != signal_id);
            awaiting.len() != before
        };
        let alert_id = self
            .alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find(|a| a.signal_id() == Some(signal_id))
            .map(|a| a.id.clone());
        match alert_id {
            Some(id) => self.acknowledge_alert(&id).map(|_| ()),
            None if was_waiting => Ok(()),
            None => Err(GovernanceError::AlertNotFound {
                id: signal_id.to_string(),
            }),
        }
    }

    /// One sweep: alert on overdue signals, re-notify unacknowledged
    /// CRITICAL alerts, expire those past the escalation limit.
    pub fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport::default();

        let ack_ttl = seconds(self.config.signal_ack_ttl_secs);
        let overdue: Vec<AwaitingAck> = {
            let mut awaiting = self.awaiting_ack.lock().unwrap_or_else(PoisonError::into_inner);
            let (overdue, waiting): (Vec<_>, Vec<_>) = awaiting
                .drain(..)
                .partition(|a| now - a.seen_at >= ack_ttl);
            *awaiting = VecDeque::from(waiting);
            overdue
        };
        for item in overdue {
            self.raise(AlertTarget::Signal(item.signal_id), item.severity);
            report.signal_alerts += 1;
        }

        let renotify_after = seconds(self.config.renotify_timeout_secs);
        let due: Vec<AlertRecord> = {
            self.alerts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|a| {
                    a.severity == Severity::Critical
                        && !a.acknowledged
                        && a.delivery == DeliveryStatus::Delivered
                        && !a.closed
                        && a.last_notified_at
                            .is_some_and(|at| now - at >= renotify_after)
                })
                .cloned()
                .collect()
        };

        for mut alert in due {
            let resolved = alert
                .decision_id()
                .and_then(|id| self.decisions.state(id))
                .is_some_and(DecisionState::is_terminal);
            if resolved {
                self.close(&mut alert);
                continue;
            }
            if alert.escalation_count >= self.config.max_escalations {
                self.expire(&mut alert);
                report.expired += 1;
                continue;
            }
            alert.escalation_count += 1;
            self.dispatch(&mut alert);
            self.store(&alert);
            report.renotified += 1;
        }
        report
    }

    /// Close an alert that ran out of re-notifications. Its decision, if
    /// any, moves to `Expired` and a `DECISION_EXPIRED` signal is emitted.
    fn expire(&self, alert: &mut AlertRecord) {
        self.close(alert);
        self.counters.expired.fetch_add(1, Ordering::Relaxed);

        let Some(decision_id) = alert.decision_id() else {
            return;
        };
        if self
            .decisions
            .transition(decision_id, DecisionState::Expired)
            .is_err()
        {
            return;
        }
        events::decision_expired(decision_id, alert.escalation_count);
        let expired = Signal::builder(
            alert.severity,
            GOVERNANCE_SOURCE,
            SignalPayload::DecisionExpired {
                decision_id: decision_id.to_string(),
                escalation_count: alert.escalation_count,
            },
        )
        .dedup_key(format!("{decision_id}:expired"))
        .timestamp(self.clock.now())
        .build();
        let _ = self.bus.emit(expired);
    }

    fn close(&self, alert: &mut AlertRecord) {
        alert.closed = true;
        self.store(alert);
    }

    /// Replace the stored copy of `alert` and persist it.
    fn store(&self, alert: &AlertRecord) {
        if let Some(stored) = self
            .alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find_mut(|a| a.id == alert.id)
        {
            // Keep an acknowledgement that raced the re-notification.
            let acknowledged = stored.acknowledged || alert.acknowledged;
            *stored = alert.clone();
            stored.acknowledged = acknowledged;
        }
        self.persist(alert);
    }

    fn persist(&self, alert: &AlertRecord) {
        if let Some(sink) = &self.sink {
            sink.submit(PersistedRecord::Alert(alert.clone()));
        }
    }

    /// Restore persisted alerts. Nothing is re-appended or re-delivered.
    pub fn load_from(&self, state: &PersistedState) {
        let mut alerts = self.alerts.lock().unwrap_or_else(PoisonError::into_inner);
        for alert in &state.alerts {
            alerts.push(alert.clone());
        }
    }

    pub fn get(&self, alert_id: &str) -> Option<AlertRecord> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find(|a| a.id == alert_id)
            .cloned()
    }

    /// Most recent alert for a decision.
    pub fn alert_for_decision(&self, decision_id: &str) -> Option<AlertRecord> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find(|a| a.decision_id() == Some(decision_id))
            .cloned()
    }

    /// Every retained alert, oldest first.
    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    pub fn dropped_count(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> AlertStats {
        let alerts = self.alerts();
        let mut stats = AlertStats {
            total: alerts.len() as u64,
            expired: self.counters.expired.load(Ordering::Relaxed),
            awaiting_ack: self
                .awaiting_ack
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len() as u64,
            ..AlertStats::default()
        };
        for alert in &alerts {
            match alert.delivery {
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Delivered => stats.delivered += 1,
                DeliveryStatus::Dropped => stats.dropped += 1,
            }
            if alert.acknowledged {
                stats.acknowledged += 1;
            }
            stats.escalations += u64::from(alert.escalation_count);
            *stats.by_severity.entry(alert.severity).or_insert(0) += 1;
        }
        stats
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs.min(i64::MAX as u64 / 1_000)).unwrap_or(0))
}

impl std::fmt::Debug for AlertSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertSink")
            .field("notifier", &self.notifier.name())
            .field("config", &self.config)
            .finish()
    }
}
