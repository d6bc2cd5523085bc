//! Structured log events for key governance operations.
//!
//! Each function emits a `tracing` event with structured fields.

/// A signal was accepted onto the bus.
pub fn signal_accepted(signal_id: &str, signal_type: &str, source: &str, sequence: u64) {
    tracing::debug!(
        event = "signal_accepted",
        signal_id = %signal_id,
        signal_type = %signal_type,
        source = %source,
        sequence = sequence,
        "signal accepted"
    );
}

/// A duplicate inside the dedup window was suppressed.
pub fn signal_suppressed(dedup_key: &str, source: &str, suppressed_count: u64) {
    tracing::debug!(
        event = "signal_suppressed",
        dedup_key = %dedup_key,
        source = %source,
        suppressed_count = suppressed_count,
        "duplicate signal suppressed"
    );
}

/// An emit was refused because its feature flag is off.
pub fn signal_disabled(signal_type: &str, flag: &str) {
    tracing::info!(
        event = "signal_disabled",
        signal_type = %signal_type,
        flag = %flag,
        "signal type disabled by feature flag"
    );
}

/// A signal failed validation at emit.
pub fn signal_rejected(source: &str, reason: &str) {
    tracing::warn!(
        event = "signal_rejected",
        source = %source,
        reason = %reason,
        "signal rejected"
    );
}

/// A subscriber handler failed or panicked.
pub fn subscriber_failed(subscriber: &str, signal_id: &str, error: &str) {
    tracing::warn!(
        event = "subscriber_failed",
        subscriber = %subscriber,
        signal_id = %signal_id,
        error = %error,
        "subscriber handler failed"
    );
}

/// A subscriber queue overflowed and a signal was dropped.
pub fn subscriber_dropped(subscriber: &str, signal_id: &str, policy: &str) {
    tracing::warn!(
        event = "subscriber_dropped",
        subscriber = %subscriber,
        signal_id = %signal_id,
        policy = %policy,
        "subscriber queue full, signal dropped"
    );
}

/// A feature flag changed.
pub fn flag_changed(name: &str, enabled: bool, killed: bool) {
    tracing::info!(
        event = "flag_changed",
        flag = %name,
        enabled = enabled,
        killed = killed,
        "feature flag changed"
    );
}

/// Safe mode toggled.
pub fn safe_mode_changed(enabled: bool) {
    tracing::warn!(
        event = "safe_mode_changed",
        enabled = enabled,
        "safe mode changed"
    );
}

/// A category threshold changed.
pub fn threshold_changed(category: &str, field: &str, old: f64, new: f64) {
    tracing::info!(
        event = "threshold_changed",
        category = %category,
        field = %field,
        old = old,
        new = new,
        "threshold changed"
    );
}

/// The confidence gate produced a decision.
pub fn decision_made(decision_id: &str, signal_id: &str, category: &str, outcome: &str) {
    tracing::info!(
        event = "decision_made",
        decision_id = %decision_id,
        signal_id = %signal_id,
        category = %category,
        outcome = %outcome,
        "decision made"
    );
}

/// An evaluation was aborted at its deadline.
pub fn evaluation_timed_out(signal_id: &str, deadline_ms: u64) {
    tracing::warn!(
        event = "evaluation_timed_out",
        signal_id = %signal_id,
        deadline_ms = deadline_ms,
        "decision evaluation exceeded deadline"
    );
}

/// A human override was recorded.
pub fn override_logged(decision_id: &str, reviewer_id: &str, disagreement: bool) {
    tracing::info!(
        event = "override_logged",
        decision_id = %decision_id,
        reviewer_id = %reviewer_id,
        disagreement = disagreement,
        "override logged"
    );
}

/// An alert was delivered.
pub fn alert_delivered(alert_id: &str, attempts: u32, escalation_count: u32) {
    tracing::info!(
        event = "alert_delivered",
        alert_id = %alert_id,
        attempts = attempts,
        escalation_count = escalation_count,
        "alert delivered"
    );
}

/// An alert exhausted its retries.
pub fn alert_dropped(alert_id: &str, attempts: u32, error: &str) {
    tracing::error!(
        event = "alert_dropped",
        alert_id = %alert_id,
        attempts = attempts,
        error = %error,
        "alert dropped after exhausting retries"
    );
}

/// A decision expired after maximum escalations.
pub fn decision_expired(decision_id: &str, escalation_count: u32) {
    tracing::warn!(
        event = "decision_expired",
        decision_id = %decision_id,
        escalation_count = escalation_count,
        "decision expired unacknowledged"
    );
}

/// A write-behind flush failed; records stay queued for the next cycle.
pub fn persistence_failed(pending: usize, error: &str) {
    tracing::warn!(
        event = "persistence_failed",
        pending = pending,
        error = %error,
        "persistence flush failed, will retry"
    );
}

pub fn persistence_dropped(kind: &str, dropped_total: u64) {
    tracing::warn!(
        event = "persistence_dropped",
        kind = kind,
        dropped_total = dropped_total,
        "write-behind backlog full, oldest record dropped"
    );
}
