//! Write-behind writer: governance components hand records to
//! [`WriteBehind::submit`], which never blocks; a background thread batches
//! them into the backend. A failed flush keeps its records and retries on
//! the next interval; the held backlog is capped at `max_pending`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use warden_core::config::PersistenceConfig;
use warden_core::errors::PersistenceError;
use warden_core::traits::{PersistedRecord, Persistence, RecordSink};
use warden_observability::tracing_setup::events;

enum Command {
    Record(PersistedRecord),
    Flush(Sender<usize>),
}

/// Writer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterStats {
    /// Submitted but not yet durable.
    pub backlog: usize,
    pub written: u64,
    pub failed_flushes: u64,
    /// Records discarded because the backlog hit `max_pending`.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    backlog: AtomicUsize,
    written: AtomicU64,
    failed_flushes: AtomicU64,
    dropped: AtomicU64,
}

pub struct WriteBehind {
    tx: RwLock<Option<Sender<Command>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl WriteBehind {
    pub fn start(
        backend: Arc<dyn Persistence>,
        config: &PersistenceConfig,
    ) -> Result<Self, PersistenceError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let counters = Arc::new(Counters::default());
        let worker = Worker {
            backend,
            rx,
            counters: Arc::clone(&counters),
            interval: Duration::from_millis(config.flush_interval_ms.max(1)),
            batch_size: config.batch_size.max(1),
            max_pending: config.max_pending.max(config.batch_size).max(1),
            pending: VecDeque::new(),
            backing_off: false,
        };
        let handle = std::thread::Builder::new()
            .name("warden-write-behind".into())
            .spawn(move || worker.run())
            .map_err(|e| PersistenceError::Unavailable {
                reason: format!("failed to start write-behind thread: {e}"),
            })?;
        Ok(Self {
            tx: RwLock::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            counters,
        })
    }

    /// Flush now and wait up to `timeout`. Returns the records still pending
    /// afterwards; `Err(QueueClosed)` once shut down.
    pub fn flush(&self, timeout: Duration) -> Result<usize, PersistenceError> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .ok_or(PersistenceError::QueueClosed)?
            .send(Command::Flush(ack_tx))
            .map_err(|_| PersistenceError::QueueClosed)?;
        ack_rx
            .recv_timeout(timeout)
            .map_err(|_| PersistenceError::Unavailable {
                reason: format!("flush did not complete within {timeout:?}"),
            })
    }

    pub fn backlog(&self) -> usize {
        self.counters.backlog.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            backlog: self.backlog(),
            written: self.counters.written.load(Ordering::Relaxed),
            failed_flushes: self.counters.failed_flushes.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting records, make a final flush attempt, join the thread.
    pub fn shutdown(&self) {
        self.tx
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl RecordSink for WriteBehind {
    fn submit(&self, record: PersistedRecord) {
        let tx = self.tx.read().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = tx.as_ref() else {
            tracing::warn!(kind = record.kind().as_str(), "storage: writer closed, record lost");
            return;
        };
        self.counters.backlog.fetch_add(1, Ordering::Relaxed);
        if tx.send(Command::Record(record)).is_err() {
            self.counters.backlog.fetch_sub(1, Ordering::Relaxed);
            tracing::warn!("storage: writer thread gone, record lost");
        }
    }
}

impl Drop for WriteBehind {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WriteBehind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBehind")
            .field("stats", &self.stats())
            .finish()
    }
}

struct Worker {
    backend: Arc<dyn Persistence>,
    rx: Receiver<Command>,
    counters: Arc<Counters>,
    interval: Duration,
    batch_size: usize,
    max_pending: usize,
    pending: VecDeque<PersistedRecord>,
    /// Set after a failed write; size-triggered flushes wait for the next
    /// interval or an explicit flush.
    backing_off: bool,
}

impl Worker {
    fn run(mut self) {
        let mut next_flush = Instant::now() + self.interval;
        loop {
            let wait = next_flush.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(wait) {
                Ok(Command::Record(record)) => {
                    self.push(record);
                    if !self.backing_off && self.pending.len() >= self.batch_size {
                        self.flush();
                        next_flush = Instant::now() + self.interval;
                    }
                }
                Ok(Command::Flush(ack)) => {
                    let mut acks = vec![ack];
                    while let Ok(command) = self.rx.try_recv() {
                        match command {
                            Command::Record(record) => self.push(record),
                            Command::Flush(ack) => acks.push(ack),
                        }
                    }
                    self.flush();
                    for ack in acks {
                        let _ = ack.send(self.pending.len());
                    }
                    next_flush = Instant::now() + self.interval;
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.flush();
                    next_flush = Instant::now() + self.interval;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush();
                    if !self.pending.is_empty() {
                        tracing::error!(
                            pending = self.pending.len(),
                            "storage: shutting down with unwritten records"
                        );
                    }
                    return;
                }
            }
        }
    }

    fn push(&mut self, record: PersistedRecord) {
        if self.pending.len() >= self.max_pending {
            if let Some(oldest) = self.pending.pop_front() {
                self.counters.backlog.fetch_sub(1, Ordering::Relaxed);
                let total = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                events::persistence_dropped(oldest.kind().as_str(), total);
            }
        }
        self.pending.push_back(record);
    }

    /// Write pending records in chunks of `batch_size`, stopping at the
    /// first failure.
    fn flush(&mut self) {
        while !self.pending.is_empty() {
            let n = self.pending.len().min(self.batch_size);
            let batch = &self.pending.make_contiguous()[..n];
            match self.backend.append_batch(batch) {
                Ok(()) => {
                    self.pending.drain(..n);
                    self.counters.written.fetch_add(n as u64, Ordering::Relaxed);
                    self.counters.backlog.fetch_sub(n, Ordering::Relaxed);
                    tracing::debug!(records = n, "storage: flushed");
                }
                Err(e) => {
                    self.backing_off = true;
                    self.counters.failed_flushes.fetch_add(1, Ordering::Relaxed);
                    events::persistence_failed(self.pending.len(), &e.to_string());
                    return;
                }
            }
        }
        self.backing_off = false;
    }
}
