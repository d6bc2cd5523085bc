//! Retention over the append-only record log.
//!
//! State kinds (flags, safe mode, thresholds) keep only their latest record
//! per key and never age out. Alerts collapse to their latest version per
//! alert id. Audit kinds (overrides, alerts) are then bounded by age and by
//! count, newest kept.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use warden_core::traits::{PersistedRecord, RecordKind, RetentionPolicy};

/// Keep-mask for `records` (in append order) under `policy`.
pub fn retained(
    records: &[PersistedRecord],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<bool> {
    let mut latest: HashMap<(RecordKind, String), usize> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        if collapses(record.kind()) {
            latest.insert((record.kind(), record.key()), idx);
        }
    }

    let cutoff = policy
        .max_age_days
        .and_then(|days| Duration::try_days(days.max(0)))
        .and_then(|age| now.checked_sub_signed(age));

    let mut keep: Vec<bool> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let kind = record.kind();
            if collapses(kind) && latest.get(&(kind, record.key())) != Some(&idx) {
                return false;
            }
            if kind.is_state() {
                return true;
            }
            cutoff.map_or(true, |cutoff| record.recorded_at() >= cutoff)
        })
        .collect();

    if let Some(max) = policy.max_records_per_kind {
        for kind in RecordKind::ALL.into_iter().filter(|k| !k.is_state()) {
            let mut seen = 0usize;
            for idx in (0..records.len()).rev() {
                if keep[idx] && records[idx].kind() == kind {
                    seen += 1;
                    if seen > max {
                        keep[idx] = false;
                    }
                }
            }
        }
    }
    keep
}

fn collapses(kind: RecordKind) -> bool {
    kind.is_state() || kind == RecordKind::Alert
}
