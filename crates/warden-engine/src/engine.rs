//! GovernanceEngine: owns every component, exposes the in-process API,
//! and shuts background threads down in dependency order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use warden_alerting::{AlertSink, AlertStats, TickReport, Ticker};
use warden_analytics::{AbstentionTrends, Analytics, GovernanceReport, SignalStats, TimeBucket};
use warden_bus::{EmitOutcome, SignalBus, SignalHandler, SubscriptionHandle, TopicFilter};
use warden_core::config::WardenConfig;
use warden_core::errors::{ValidationError, WardenResult};
use warden_core::models::{
    AlertRecord, Category, Decision, DecisionState, FeatureFlag, FlagTier, HealthMetrics,
    HealthReport, OverrideRecord, Outcome, Signal, ThresholdField, Thresholds,
};
use warden_core::traits::{Clock, Persistence};
use warden_flags::FeatureFlagRegistry;
use warden_gate::{ConfidenceGate, DecisionStore, ThresholdRegistry};
use warden_ledger::{BiasScore, ConfidenceTrend, DisagreementPattern, OverrideLedger, OverrideStats};
use warden_observability::{HealthReporter, HealthSnapshot};
use warden_storage::WriteBehind;

/// The governance core of one process.
///
/// Built by [`EngineBuilder`](crate::EngineBuilder). Dropping the engine
/// is equivalent to calling [`shutdown`](Self::shutdown).
pub struct GovernanceEngine {
    pub(crate) config: WardenConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) flags: Arc<FeatureFlagRegistry>,
    pub(crate) bus: Arc<SignalBus>,
    pub(crate) thresholds: Arc<ThresholdRegistry>,
    pub(crate) decisions: Arc<DecisionStore>,
    pub(crate) gate: Arc<ConfidenceGate>,
    pub(crate) ledger: Arc<OverrideLedger>,
    pub(crate) alerts: Arc<AlertSink>,
    pub(crate) analytics: Analytics,
    pub(crate) backend: Option<Arc<dyn Persistence>>,
    pub(crate) writer: Option<Arc<WriteBehind>>,
    pub(crate) ticker: Mutex<Option<Ticker>>,
    pub(crate) shut_down: AtomicBool,
}

impl GovernanceEngine {
    // --- Signals -----------------------------------------------------------

    /// Validate, deduplicate, record, and fan out one signal.
    pub fn emit(&self, signal: Signal) -> Result<EmitOutcome, ValidationError> {
        self.bus.emit(signal)
    }

    pub fn subscribe(
        &self,
        filter: TopicFilter,
        handler: impl SignalHandler,
    ) -> WardenResult<SubscriptionHandle> {
        Ok(self.bus.subscribe(filter, handler)?)
    }

    pub fn subscribe_named(
        &self,
        name: impl Into<String>,
        filter: TopicFilter,
        handler: impl SignalHandler,
    ) -> WardenResult<SubscriptionHandle> {
        Ok(self.bus.subscribe_named(name, filter, handler)?)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> WardenResult<()> {
        Ok(self.bus.unsubscribe(handle)?)
    }

    /// Block until every subscriber queue, including the gate's and the
    /// alert sink's, has drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.bus.wait_idle(timeout)
    }

    pub fn signal(&self, signal_id: &str) -> Option<Signal> {
        self.bus.get(signal_id)
    }

    pub fn history(&self) -> Vec<Signal> {
        self.bus.history()
    }

    pub fn suppressed_count(&self, dedup_key: &str) -> u64 {
        self.bus.suppressed_count(dedup_key)
    }

    // --- Flags -------------------------------------------------------------

    pub fn is_enabled(&self, name: &str) -> bool {
        self.flags.is_enabled(name)
    }

    pub fn flag(&self, name: &str) -> Option<FeatureFlag> {
        self.flags.get(name)
    }

    pub fn register_flag(&self, name: &str, tier: FlagTier, enabled: bool) -> WardenResult<()> {
        Ok(self.flags.register(name, tier, enabled)?)
    }

    pub fn set_flag(&self, name: &str, enabled: bool) -> WardenResult<()> {
        Ok(self.flags.set_flag(name, enabled)?)
    }

    pub fn kill_feature(&self, name: &str) -> WardenResult<()> {
        Ok(self.flags.kill_feature(name)?)
    }

    pub fn restore_flag(&self, name: &str) -> WardenResult<()> {
        Ok(self.flags.restore_flag(name)?)
    }

    pub fn set_safe_mode(&self, enabled: bool) {
        self.flags.set_safe_mode(enabled);
    }

    pub fn safe_mode(&self) -> bool {
        self.flags.safe_mode()
    }

    // --- Gate --------------------------------------------------------------

    /// Replace one threshold field. The previous value is kept on error.
    pub fn set_threshold(
        &self,
        category: Category,
        field: ThresholdField,
        value: f64,
    ) -> WardenResult<Thresholds> {
        Ok(self.thresholds.set_threshold(category, field, value)?)
    }

    pub fn thresholds(&self, category: Category) -> Thresholds {
        self.thresholds.get(category)
    }

    pub fn decision(&self, decision_id: &str) -> Option<Decision> {
        self.decisions.get(decision_id)
    }

    pub fn decision_state(&self, decision_id: &str) -> Option<DecisionState> {
        self.decisions.state(decision_id)
    }

    /// Decision the gate made for a detection signal, if any.
    pub fn decision_for_signal(&self, signal_id: &str) -> Option<Decision> {
        self.decisions
            .all()
            .into_iter()
            .rev()
            .find(|d| d.signal_id == signal_id)
    }

    pub fn decisions(&self) -> Vec<Decision> {
        self.decisions.all()
    }

    // --- Ledger ------------------------------------------------------------

    pub fn log_override(
        &self,
        decision_id: &str,
        human_outcome: Outcome,
        reviewer_id: &str,
        reason: &str,
    ) -> WardenResult<OverrideRecord> {
        self.ledger
            .log_override(decision_id, human_outcome, reviewer_id, reason)
    }

    pub fn overrides(&self) -> Vec<OverrideRecord> {
        self.ledger.records()
    }

    // --- Alerting ----------------------------------------------------------

    pub fn acknowledge_alert(&self, alert_id: &str) -> WardenResult<AlertRecord> {
        Ok(self.alerts.acknowledge_alert(alert_id)?)
    }

    pub fn acknowledge_signal(&self, signal_id: &str) -> WardenResult<()> {
        Ok(self.alerts.acknowledge_signal(signal_id)?)
    }

    /// One sweep of signal acknowledgement TTLs and CRITICAL re-notification.
    /// The background ticker calls this on its own schedule.
    pub fn tick(&self) -> TickReport {
        self.alerts.tick()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.alerts()
    }

    pub fn alert_for_decision(&self, decision_id: &str) -> Option<AlertRecord> {
        self.alerts.alert_for_decision(decision_id)
    }

    // --- Analytics ---------------------------------------------------------

    pub fn signal_stats(&self, bucket: TimeBucket) -> SignalStats {
        self.analytics.signal_stats(bucket)
    }

    pub fn override_stats(&self) -> OverrideStats {
        self.analytics.override_stats()
    }

    pub fn bias_score(&self, source: &str) -> BiasScore {
        self.analytics.bias_score(source)
    }

    pub fn bias_scores(&self) -> Vec<BiasScore> {
        self.analytics.bias_scores_by_source()
    }

    pub fn abstention_trends(&self, bucket: TimeBucket) -> AbstentionTrends {
        self.analytics.abstention_trends(bucket)
    }

    pub fn confidence_trend(&self, last_n: usize) -> ConfidenceTrend {
        self.analytics.confidence_trend(last_n)
    }

    pub fn top_disagreements(&self, top_n: usize) -> Vec<DisagreementPattern> {
        self.analytics.top_disagreements(top_n)
    }

    pub fn alert_stats(&self) -> AlertStats {
        self.analytics.alert_stats()
    }

    pub fn report(&self, bucket: TimeBucket) -> GovernanceReport {
        self.analytics.report(bucket)
    }

    // --- Health & persistence ---------------------------------------------

    pub fn health(&self) -> HealthReport {
        let bus = self.bus.stats();
        let gate = self.gate.stats();
        let writer = self.writer.as_ref().map(|w| w.stats()).unwrap_or_default();
        HealthReporter::build(&HealthSnapshot {
            metrics: HealthMetrics {
                signals_accepted: bus.accepted,
                signals_suppressed: bus.suppressed,
                subscriber_failures: bus.subscriber_failures,
                subscriber_drops: bus.subscriber_drops,
                decisions: gate.decisions,
                abstentions: gate.abstained,
                evaluation_timeouts: gate.timeouts,
                alerts_dropped: self.alerts.dropped_count(),
                persistence_backlog: writer.backlog,
                persistence_failures: writer.failed_flushes,
            },
            subscriber_count: bus.subscribers.len(),
            queued_signals: usize::try_from(bus.queued()).unwrap_or(usize::MAX),
            persistence_enabled: self.writer.is_some(),
        })
    }

    /// Write pending records now. Returns how many are still pending; always
    /// `0` when running in memory.
    pub fn flush(&self, timeout: Duration) -> WardenResult<usize> {
        match &self.writer {
            Some(writer) => Ok(writer.flush(timeout)?),
            None => Ok(0),
        }
    }

    /// Flush, then apply the configured retention to the backend.
    pub fn compact(&self, timeout: Duration) -> WardenResult<usize> {
        let Some(backend) = &self.backend else {
            return Ok(0);
        };
        self.flush(timeout)?;
        Ok(backend.compact(&self.config.persistence.retention())?)
    }

    /// Stop the ticker, drain subscribers, flush the writer. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut ticker) = ticker {
            ticker.stop();
        }
        self.bus.shutdown();
        if let Some(writer) = &self.writer {
            writer.shutdown();
        }
        tracing::info!("engine: shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    // --- Components --------------------------------------------------------

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn bus(&self) -> &Arc<SignalBus> {
        &self.bus
    }

    pub fn flags(&self) -> &Arc<FeatureFlagRegistry> {
        &self.flags
    }

    pub fn gate(&self) -> &Arc<ConfidenceGate> {
        &self.gate
    }

    pub fn ledger(&self) -> &Arc<OverrideLedger> {
        &self.ledger
    }

    pub fn alert_sink(&self) -> &Arc<AlertSink> {
        &self.alerts
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }
}

impl Drop for GovernanceEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for GovernanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernanceEngine")
            .field("persistence", &self.backend.is_some())
            .field("safe_mode", &self.flags.safe_mode())
            .field("decisions", &self.decisions.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
