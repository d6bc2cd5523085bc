//! Engine construction: config, optional persistence, notifier, clock.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warden_alerting::{AlertSink, Ticker};
use warden_analytics::Analytics;
use warden_bus::SignalBus;
use warden_core::config::{PersistenceConfig, WardenConfig};
use warden_core::errors::{SubscriberError, WardenResult};
use warden_core::traits::{
    Clock, DisagreementSource, Notifier, PersistedState, Persistence, RecordSink, SystemClock,
};
use warden_flags::FeatureFlagRegistry;
use warden_gate::{ConfidenceGate, DecisionStore, ThresholdRegistry};
use warden_ledger::OverrideLedger;
use warden_storage::{SqlitePersistence, WriteBehind};

use crate::engine::GovernanceEngine;
use crate::notifier::LogNotifier;

/// Options for building a [`GovernanceEngine`].
///
/// Persistence resolution: an explicit [`persistence`](Self::persistence)
/// backend wins; otherwise `persistence.db_path` opens SQLite; otherwise the
/// engine runs in memory only.
pub struct EngineBuilder {
    config: WardenConfig,
    persistence: Option<Arc<dyn Persistence>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    background_ticker: bool,
    install_tracing: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: WardenConfig::default(),
            persistence: None,
            notifier: None,
            clock: None,
            background_ticker: true,
            install_tracing: false,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a TOML document. Parse and validation errors surface here.
    pub fn from_toml(input: &str) -> WardenResult<Self> {
        Ok(Self::new().config(WardenConfig::from_toml(input)?))
    }

    pub fn config(mut self, config: WardenConfig) -> Self {
        self.config = config;
        self
    }

    pub fn persistence(mut self, backend: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(backend);
        self
    }

    /// Alert channel. Defaults to [`LogNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Time source. Defaults to the wall clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Run the alert sweep on a background thread every
    /// `alerting.tick_interval_secs`. On by default; turn it off to drive
    /// [`GovernanceEngine::tick`] by hand.
    pub fn background_ticker(mut self, enabled: bool) -> Self {
        self.background_ticker = enabled;
        self
    }

    /// Install the global tracing subscriber from `observability` config.
    pub fn install_tracing(mut self, enabled: bool) -> Self {
        self.install_tracing = enabled;
        self
    }

    pub fn build(self) -> WardenResult<GovernanceEngine> {
        let config = self.config;
        config.validate()?;
        if self.install_tracing {
            warden_observability::init_tracing(&config.observability);
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));

        // Storage
        let backend: Option<Arc<dyn Persistence>> = match self.persistence {
            Some(backend) => Some(backend),
            None => match &config.persistence.db_path {
                Some(path) => Some(Arc::new(SqlitePersistence::open(Path::new(path))?)),
                None => None,
            },
        };
        let state = backend
            .as_deref()
            .map(|b| restore(b, &config.persistence))
            .unwrap_or_default();
        let writer = backend
            .as_ref()
            .map(|b| WriteBehind::start(Arc::clone(b), &config.persistence))
            .transpose()?
            .map(Arc::new);
        let sink: Option<Arc<dyn RecordSink>> = writer
            .as_ref()
            .map(|w| Arc::clone(w) as Arc<dyn RecordSink>);

        // Flags
        let mut flags = FeatureFlagRegistry::with_defaults();
        if let Some(sink) = &sink {
            flags = flags.with_sink(Arc::clone(sink));
        }
        flags.load_from(&state);
        let flags = Arc::new(flags);

        // Bus
        let bus = Arc::new(
            SignalBus::new(config.bus.clone(), Arc::clone(&clock)).with_flags(Arc::clone(&flags)),
        );

        // Thresholds
        let mut thresholds = ThresholdRegistry::new(&config.gate);
        if let Some(sink) = &sink {
            thresholds = thresholds.with_sink(Arc::clone(sink));
        }
        thresholds.load_from(&state);
        let thresholds = Arc::new(thresholds);

        // Ledger, which also feeds the gate its disagreement rate
        let decisions = Arc::new(DecisionStore::new(config.gate.history_capacity));
        let mut ledger = OverrideLedger::new(
            config.ledger.clone(),
            Arc::clone(&decisions),
            Arc::clone(&clock),
        );
        if let Some(sink) = &sink {
            ledger = ledger.with_sink(Arc::clone(sink));
        }
        ledger.load_from(&state);
        let ledger = Arc::new(ledger);

        // Gate
        let gate = Arc::new(ConfidenceGate::new(
            &config.gate,
            Arc::clone(&bus),
            Arc::clone(&thresholds),
            Arc::clone(&ledger) as Arc<dyn DisagreementSource>,
            Arc::clone(&decisions),
            Arc::clone(&clock),
        ));

        // Alerting
        let mut alerts = AlertSink::new(
            config.alerting.clone(),
            Arc::clone(&bus),
            Arc::clone(&decisions),
            notifier,
            Arc::clone(&clock),
        )
        .with_flags(Arc::clone(&flags));
        if let Some(sink) = &sink {
            alerts = alerts.with_sink(Arc::clone(sink));
        }
        alerts.load_from(&state);
        let alerts = Arc::new(alerts);

        // Subscriptions are closed by `bus.shutdown()`, so a failed attach
        // must not leave the gate and bus holding each other.
        if let Err(e) = gate.attach().and_then(|_| alerts.attach()) {
            bus.shutdown();
            return Err(e.into());
        }

        let ticker = if self.background_ticker {
            let interval = Duration::from_secs(config.alerting.tick_interval_secs.max(1));
            match Ticker::start(Arc::clone(&alerts), interval) {
                Ok(ticker) => Some(ticker),
                Err(e) => {
                    bus.shutdown();
                    return Err(SubscriberError::WorkerSpawn {
                        subscriber: "alert-ticker".into(),
                        reason: e.to_string(),
                    }
                    .into());
                }
            }
        } else {
            None
        };

        let analytics = Analytics::new(
            Arc::clone(&bus),
            Arc::clone(&gate),
            Arc::clone(&ledger),
            Arc::clone(&alerts),
            Arc::clone(&clock),
        );

        tracing::info!(
            persistence = backend.is_some(),
            flags = flags.snapshot().len(),
            overrides = ledger.len(),
            alerts = alerts.alerts().len(),
            "engine: started"
        );

        Ok(GovernanceEngine {
            config,
            clock,
            flags,
            bus,
            thresholds,
            decisions,
            gate,
            ledger,
            alerts,
            analytics,
            backend,
            writer,
            ticker: Mutex::new(ticker),
            shut_down: AtomicBool::new(false),
        })
    }
}

/// Compact, then replay. A backend that cannot be read leaves the engine
/// running with empty state.
fn restore(backend: &dyn Persistence, config: &PersistenceConfig) -> PersistedState {
    if let Err(e) = backend.compact(&config.retention()) {
        tracing::warn!(error = %e, "engine: startup compaction failed");
    }
    match backend.load() {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "engine: failed to load governance state, starting empty");
            PersistedState::default()
        }
    }
}
