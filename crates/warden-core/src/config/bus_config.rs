use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::defaults;
use crate::models::SignalType;

/// What a subscriber queue does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest queued signal to make room.
    #[default]
    DropOldest,
    /// Discard the incoming signal.
    DropNewest,
}

/// Signal bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Maximum accepted signals retained in history.
    pub history_capacity: usize,
    /// Sliding dedup window (seconds).
    pub dedup_ttl_secs: u64,
    /// Bounded inbound queue size per subscriber.
    pub subscriber_queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    /// Signal types whose emission requires a feature flag to be enabled.
    pub flag_gates: BTreeMap<SignalType, String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_capacity: defaults::DEFAULT_HISTORY_CAPACITY,
            dedup_ttl_secs: defaults::DEFAULT_DEDUP_TTL_SECS,
            subscriber_queue_capacity: defaults::DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            flag_gates: BTreeMap::new(),
        }
    }
}
