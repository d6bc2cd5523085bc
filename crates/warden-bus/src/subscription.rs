//! Subscribers: topic filters, handlers, and the per-subscriber worker.

use std::collections::BTreeSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use warden_core::config::OverflowPolicy;
use warden_core::errors::SubscriberError;
use warden_core::models::{Severity, Signal, SignalType};
use warden_observability::tracing_setup::events;

/// Opaque subscription id returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionHandle(pub(crate) u64);

impl SubscriptionHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Which signals a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    /// Wildcard.
    All,
    Types(BTreeSet<SignalType>),
    /// Any type at or above the given severity.
    MinSeverity(Severity),
}

impl TopicFilter {
    pub fn types(types: impl IntoIterator<Item = SignalType>) -> Self {
        Self::Types(types.into_iter().collect())
    }

    pub fn matches(&self, signal: &Signal) -> bool {
        match self {
            Self::All => true,
            Self::Types(types) => types.contains(&signal.signal_type),
            Self::MinSeverity(min) => signal.severity >= *min,
        }
    }
}

/// Consumer callback. Runs on the subscriber's own worker thread.
pub trait SignalHandler: Send + Sync + 'static {
    fn handle(&self, signal: &Signal) -> Result<(), SubscriberError>;
}

impl<F> SignalHandler for F
where
    F: Fn(&Signal) -> Result<(), SubscriberError> + Send + Sync + 'static,
{
    fn handle(&self, signal: &Signal) -> Result<(), SubscriberError> {
        self(signal)
    }
}

/// Point-in-time counters for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberStats {
    pub handle: SubscriptionHandle,
    pub name: String,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
    pub pending: u64,
}

/// Counters shared between the bus and every worker.
#[derive(Debug, Default)]
pub(crate) struct FanoutCounters {
    pub failures: AtomicU64,
    pub drops: AtomicU64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    /// Handled (delivered or failed) or evicted from the queue.
    settled: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// A registered subscriber and its worker.
pub(crate) struct Subscriber {
    handle: SubscriptionHandle,
    name: String,
    filter: TopicFilter,
    tx: Option<Sender<Arc<Signal>>>,
    /// Second receiver end, used to evict the oldest queued signal.
    evict_rx: Receiver<Arc<Signal>>,
    counters: Arc<Counters>,
    fanout: Arc<FanoutCounters>,
    worker: Option<JoinHandle<()>>,
}

impl Subscriber {
    pub(crate) fn spawn(
        handle: SubscriptionHandle,
        name: String,
        filter: TopicFilter,
        capacity: usize,
        handler: Arc<dyn SignalHandler>,
        fanout: Arc<FanoutCounters>,
    ) -> Result<Self, SubscriberError> {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded::<Arc<Signal>>(capacity);
        let counters = Arc::new(Counters::default());

        let worker = {
            let rx = rx.clone();
            let counters = Arc::clone(&counters);
            let fanout = Arc::clone(&fanout);
            let worker_name = name.clone();
            std::thread::Builder::new()
                .name(format!("warden-{handle}"))
                .spawn(move || run_worker(&worker_name, rx, handler, &counters, &fanout))
                .map_err(|e| SubscriberError::WorkerSpawn {
                    subscriber: name.clone(),
                    reason: e.to_string(),
                })?
        };

        Ok(Self {
            handle,
            name,
            filter,
            tx: Some(tx),
            evict_rx: rx,
            counters,
            fanout,
            worker: Some(worker),
        })
    }

    pub(crate) fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    pub(crate) fn matches(&self, signal: &Signal) -> bool {
        self.filter.matches(signal)
    }

    /// Enqueue without blocking. Overflow is resolved by `policy` and
    /// counted; it is never reported to the emitter.
    pub(crate) fn offer(&self, signal: &Arc<Signal>, policy: OverflowPolicy) {
        let Some(tx) = &self.tx else {
            return;
        };
        // Count before sending so the worker can never settle an entry
        // that is not yet counted as enqueued.
        self.counters.enqueued.fetch_add(1, Ordering::SeqCst);
        let incoming = match tx.try_send(Arc::clone(signal)) {
            Ok(()) => return,
            Err(TrySendError::Disconnected(_)) => {
                self.counters.enqueued.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            Err(TrySendError::Full(incoming)) => incoming,
        };
        if policy == OverflowPolicy::DropOldest {
            if let Ok(oldest) = self.evict_rx.try_recv() {
                self.counters.settled.fetch_add(1, Ordering::SeqCst);
                self.record_drop(&oldest.id, policy);
            }
            if let Err(e) = tx.try_send(incoming) {
                self.counters.enqueued.fetch_sub(1, Ordering::SeqCst);
                self.record_drop(&e.into_inner().id, policy);
            }
            return;
        }
        self.counters.enqueued.fetch_sub(1, Ordering::SeqCst);
        self.record_drop(&incoming.id, policy);
    }

    fn record_drop(&self, signal_id: &str, policy: OverflowPolicy) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        self.fanout.drops.fetch_add(1, Ordering::Relaxed);
        events::subscriber_dropped(&self.name, signal_id, policy_name(policy));
    }

    /// Signals queued or being handled.
    pub(crate) fn pending(&self) -> u64 {
        let enqueued = self.counters.enqueued.load(Ordering::SeqCst);
        let settled = self.counters.settled.load(Ordering::SeqCst);
        enqueued.saturating_sub(settled)
    }

    pub(crate) fn stats(&self) -> SubscriberStats {
        SubscriberStats {
            handle: self.handle,
            name: self.name.clone(),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }

    /// Close the queue and join the worker once it has drained. A worker
    /// closing its own subscription is detached instead of joined.
    pub(crate) fn close(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != std::thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("filter", &self.filter)
            .finish()
    }
}

fn run_worker(
    name: &str,
    rx: Receiver<Arc<Signal>>,
    handler: Arc<dyn SignalHandler>,
    counters: &Counters,
    fanout: &FanoutCounters,
) {
    while let Ok(signal) = rx.recv() {
        let result = catch_unwind(AssertUnwindSafe(|| handler.handle(&signal)));
        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(panic) => Some(SubscriberError::HandlerPanicked {
                message: panic_message(panic.as_ref()),
            }),
        };
        match error {
            None => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Some(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                fanout.failures.fetch_add(1, Ordering::Relaxed);
                events::subscriber_failed(name, &signal.id, &e.to_string());
            }
        }
        counters.settled.fetch_add(1, Ordering::SeqCst);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub(crate) fn policy_name(policy: OverflowPolicy) -> &'static str {
    match policy {
        OverflowPolicy::DropOldest => "drop_oldest",
        OverflowPolicy::DropNewest => "drop_newest",
    }
}
