//! Sliding-TTL dedup table.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

/// Maps dedup keys to their expiry. Accepting a key (re-)arms it with a
/// fresh TTL; suppressed duplicates never extend the window.
#[derive(Debug)]
pub struct DedupTable {
    ttl: Duration,
    expiries: HashMap<String, DateTime<Utc>>,
    /// Arm order, used to purge in amortized O(1). Stale entries (re-armed
    /// keys) are skipped on purge.
    order: VecDeque<(DateTime<Utc>, String)>,
}

impl DedupTable {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            expiries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Whether `key` has a live entry at `now`.
    pub fn is_live(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.expiries.get(key).is_some_and(|expiry| *expiry > now)
    }

    /// Arm `key` until `now + ttl`.
    pub fn arm(&mut self, key: &str, now: DateTime<Utc>) {
        let expiry = now + self.ttl;
        self.expiries.insert(key.to_string(), expiry);
        self.order.push_back((expiry, key.to_string()));
    }

    /// Drop every entry expired at `now`. Returns how many keys were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while let Some((expiry, _)) = self.order.front() {
            if *expiry > now {
                break;
            }
            let Some((expiry, key)) = self.order.pop_front() else {
                break;
            };
            // Only remove if the key was not re-armed since this entry.
            if self.expiries.get(&key) == Some(&expiry) {
                self.expiries.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}
