//! [`SignalBus`]: emit, dedup, history, fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use warden_core::config::BusConfig;
use warden_core::errors::{GovernanceError, SubscriberError, ValidationError};
use warden_core::history::BoundedHistory;
use warden_core::models::{Signal, SignalType};
use warden_core::traits::Clock;
use warden_flags::FeatureFlagRegistry;
use warden_observability::tracing_setup::events;

use crate::dedup::DedupTable;
use crate::subscription::{
    FanoutCounters, SignalHandler, Subscriber, SubscriberStats, SubscriptionHandle, TopicFilter,
};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(2);
/// Dedup windows longer than a year are clamped.
const MAX_DEDUP_TTL_SECS: u64 = 365 * 24 * 3600;

/// Result of a successful (non-erroring) emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmitOutcome {
    /// Appended to history and fanned out.
    Accepted { id: String, sequence: u64 },
    /// A live dedup entry exists; only the suppressed count changed.
    Suppressed {
        dedup_key: String,
        suppressed_count: u64,
    },
    /// The signal type's feature flag is off. Nothing happened.
    Disabled { flag: String },
}

impl EmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed { .. })
    }
}

/// Point-in-time bus counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusStats {
    pub accepted: u64,
    pub suppressed: u64,
    pub disabled: u64,
    pub rejected: u64,
    pub history_len: usize,
    pub history_capacity: usize,
    pub evicted: u64,
    pub live_dedup_keys: usize,
    pub subscriber_failures: u64,
    pub subscriber_drops: u64,
    pub subscribers: Vec<SubscriberStats>,
}

impl BusStats {
    /// Signals queued across every subscriber.
    pub fn queued(&self) -> u64 {
        self.subscribers.iter().map(|s| s.pending).sum()
    }
}

#[derive(Debug, Default)]
struct EmitCounters {
    accepted: AtomicU64,
    suppressed: AtomicU64,
    disabled: AtomicU64,
    rejected: AtomicU64,
}

/// State serialized under the bus mutex: dedup decisions and history order
/// are totally ordered.
#[derive(Debug)]
struct BusState {
    history: BoundedHistory<Arc<Signal>>,
    dedup: DedupTable,
    next_sequence: u64,
}

/// The in-process signal bus. Construct one per process and share it by `Arc`.
pub struct SignalBus {
    config: BusConfig,
    clock: Arc<dyn Clock>,
    flags: Option<Arc<FeatureFlagRegistry>>,
    state: Mutex<BusState>,
    /// Registration order. Locked after `state` when both are held.
    subscribers: Mutex<Vec<Subscriber>>,
    suppressed: DashMap<String, u64>,
    next_handle: AtomicU64,
    counters: EmitCounters,
    fanout: Arc<FanoutCounters>,
}

impl SignalBus {
    pub fn new(config: BusConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl_secs = config.dedup_ttl_secs.min(MAX_DEDUP_TTL_SECS);
        let ttl = ChronoDuration::seconds(i64::try_from(ttl_secs).unwrap_or(0));
        Self {
            state: Mutex::new(BusState {
                history: BoundedHistory::new(config.history_capacity),
                dedup: DedupTable::new(ttl),
                next_sequence: 0,
            }),
            config,
            clock,
            flags: None,
            subscribers: Mutex::new(Vec::new()),
            suppressed: DashMap::new(),
            next_handle: AtomicU64::new(1),
            counters: EmitCounters::default(),
            fanout: Arc::new(FanoutCounters::default()),
        }
    }

    /// Consult `flags` for the signal types listed in `bus.flag_gates`.
    pub fn with_flags(mut self, flags: Arc<FeatureFlagRegistry>) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Whether signals of `signal_type` would currently be admitted.
    pub fn is_permitted(&self, signal_type: SignalType) -> bool {
        self.blocking_flag(signal_type).is_none()
    }

    fn blocking_flag(&self, signal_type: SignalType) -> Option<&str> {
        let flag = self.config.flag_gates.get(&signal_type)?;
        let flags = self.flags.as_ref()?;
        (!flags.is_enabled(flag)).then_some(flag.as_str())
    }

    /// Validate, dedup, append, fan out.
    ///
    /// A `ValidationError` means nothing happened. Subscriber failures are
    /// never reported here.
    pub fn emit(&self, mut signal: Signal) -> Result<EmitOutcome, ValidationError> {
        if let Err(e) = signal.validate() {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            events::signal_rejected(&signal.source, &e.to_string());
            return Err(e);
        }

        if let Some(flag) = self.blocking_flag(signal.signal_type) {
            self.counters.disabled.fetch_add(1, Ordering::Relaxed);
            events::signal_disabled(signal.signal_type.as_str(), flag);
            return Ok(EmitOutcome::Disabled {
                flag: flag.to_string(),
            });
        }

        if signal.dedup_key.is_empty() {
            signal.dedup_key = signal.derive_dedup_key();
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        state.dedup.purge_expired(now);

        if state.dedup.is_live(&signal.dedup_key, now) {
            let suppressed_count = {
                let mut count = self.suppressed.entry(signal.dedup_key.clone()).or_insert(0);
                *count += 1;
                *count
            };
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            events::signal_suppressed(&signal.dedup_key, &signal.source, suppressed_count);
            return Ok(EmitOutcome::Suppressed {
                dedup_key: signal.dedup_key,
                suppressed_count,
            });
        }

        state.next_sequence += 1;
        signal.sequence = state.next_sequence;
        state.dedup.arm(&signal.dedup_key, now);
        let signal = Arc::new(signal);
        state.history.push(Arc::clone(&signal));
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        events::signal_accepted(
            &signal.id,
            signal.signal_type.as_str(),
            &signal.source,
            signal.sequence,
        );

        // Fan out while still holding `state`, so every queue sees signals
        // in sequence order.
        let subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        for subscriber in subscribers.iter().filter(|s| s.matches(&signal)) {
            subscriber.offer(&signal, self.config.overflow_policy);
        }

        Ok(EmitOutcome::Accepted {
            id: signal.id.clone(),
            sequence: signal.sequence,
        })
    }

    /// Register a handler behind a bounded queue and its own worker thread.
    pub fn subscribe(
        &self,
        filter: TopicFilter,
        handler: impl SignalHandler,
    ) -> Result<SubscriptionHandle, SubscriberError> {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.subscribe_inner(handle, handle.to_string(), filter, Arc::new(handler))
    }

    /// Like [`subscribe`](Self::subscribe) with a name used in logs and stats.
    pub fn subscribe_named(
        &self,
        name: impl Into<String>,
        filter: TopicFilter,
        handler: impl SignalHandler,
    ) -> Result<SubscriptionHandle, SubscriberError> {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.subscribe_inner(handle, name.into(), filter, Arc::new(handler))
    }

    fn subscribe_inner(
        &self,
        handle: SubscriptionHandle,
        name: String,
        filter: TopicFilter,
        handler: Arc<dyn SignalHandler>,
    ) -> Result<SubscriptionHandle, SubscriberError> {
        let subscriber = Subscriber::spawn(
            handle,
            name,
            filter,
            self.config.subscriber_queue_capacity,
            handler,
            Arc::clone(&self.fanout),
        )?;
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
        Ok(handle)
    }

    /// Remove a subscription. Already-queued signals are still handled
    /// before the worker exits.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), GovernanceError> {
        let removed = {
            let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            let index = subscribers
                .iter()
                .position(|s| s.handle() == handle)
                .ok_or(GovernanceError::SubscriptionNotFound { handle: handle.id() })?;
            subscribers.remove(index)
        };
        removed.close();
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Block until every subscriber queue is drained or `timeout` elapses.
    /// Returns whether the bus went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let pending: u64 = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(Subscriber::pending)
                .sum();
            if pending == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(IDLE_POLL_INTERVAL);
        }
    }

    /// Close every subscription and join the workers after they drain.
    pub fn shutdown(&self) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for subscriber in subscribers {
            subscriber.close();
        }
    }

    /// Drop expired dedup entries now rather than at the next emit.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        state.dedup.purge_expired(now)
    }

    // --- Queries -----------------------------------------------------------

    /// Every retained signal, oldest first.
    pub fn history(&self) -> Vec<Signal> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.history.iter().map(|s| (**s).clone()).collect()
    }

    /// The `n` most recent signals, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Signal> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = state.history.len().saturating_sub(n);
        state.history.iter().skip(skip).map(|s| (**s).clone()).collect()
    }

    pub fn get(&self, signal_id: &str) -> Option<Signal> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .history
            .find(|s| s.id == signal_id)
            .map(|s| (**s).clone())
    }

    /// Retained signals sharing a correlation id, oldest first.
    pub fn by_correlation(&self, correlation_id: &str) -> Vec<Signal> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .history
            .iter()
            .filter(|s| s.correlation_id.as_deref() == Some(correlation_id))
            .map(|s| (**s).clone())
            .collect()
    }

    /// Duplicates suppressed for `dedup_key` since start.
    pub fn suppressed_count(&self, dedup_key: &str) -> u64 {
        self.suppressed.get(dedup_key).map(|c| *c).unwrap_or(0)
    }

    /// Every key with at least one suppressed duplicate.
    pub fn suppressed_counts(&self) -> Vec<(String, u64)> {
        let mut counts: Vec<(String, u64)> = self
            .suppressed
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    pub fn stats(&self) -> BusStats {
        let (history_len, history_capacity, evicted, live_dedup_keys) = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            (
                state.history.len(),
                state.history.capacity(),
                state.history.evicted(),
                state.dedup.len(),
            )
        };
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Subscriber::stats)
            .collect();
        BusStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            disabled: self.counters.disabled.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            history_len,
            history_capacity,
            evicted,
            live_dedup_keys,
            subscriber_failures: self.fanout.failures.load(Ordering::Relaxed),
            subscriber_drops: self.fanout.drops.load(Ordering::Relaxed),
            subscribers,
        }
    }
}

impl Drop for SignalBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("config", &self.config)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
