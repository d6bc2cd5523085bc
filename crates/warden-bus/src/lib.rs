//! # warden-bus
//!
//! The single in-process signal bus. Producers `emit`, the bus validates,
//! deduplicates inside a sliding TTL window, appends to a bounded history,
//! and fans out to subscribers through bounded per-subscriber queues, each
//! drained by its own worker thread.

pub mod bus;
pub mod dedup;
pub mod subscription;

pub use bus::{BusStats, EmitOutcome, SignalBus};
pub use dedup::DedupTable;
pub use subscription::{SignalHandler, SubscriberStats, SubscriptionHandle, TopicFilter};
