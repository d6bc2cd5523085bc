//! Per-subsystem health checks: bus, gate, alerting, persistence.

use warden_core::models::{HealthStatus, SubsystemHealth};

use super::reporter::HealthSnapshot;

const PERSISTENCE_BACKLOG_DEGRADED: usize = 1_000;
const PERSISTENCE_BACKLOG_UNHEALTHY: usize = 10_000;

/// Runs health checks against each subsystem.
pub struct SubsystemChecker;

impl SubsystemChecker {
    pub fn check_all(snapshot: &HealthSnapshot) -> Vec<SubsystemHealth> {
        vec![
            Self::check_bus(snapshot),
            Self::check_gate(snapshot),
            Self::check_alerting(snapshot),
            Self::check_persistence(snapshot),
        ]
    }

    /// Bus: degraded once any subscriber has dropped or failed, unhealthy if
    /// more than a quarter of accepted signals were dropped somewhere.
    fn check_bus(snapshot: &HealthSnapshot) -> SubsystemHealth {
        let m = &snapshot.metrics;
        let (status, message) = if m.signals_accepted > 0
            && m.subscriber_drops * 4 > m.signals_accepted
        {
            (
                HealthStatus::Unhealthy,
                Some(format!(
                    "{} subscriber drops for {} accepted signals",
                    m.subscriber_drops, m.signals_accepted
                )),
            )
        } else if m.subscriber_drops > 0 || m.subscriber_failures > 0 {
            (
                HealthStatus::Degraded,
                Some(format!(
                    "{} drops, {} handler failures",
                    m.subscriber_drops, m.subscriber_failures
                )),
            )
        } else {
            (HealthStatus::Healthy, None)
        };
        SubsystemHealth {
            name: "bus".into(),
            status,
            message,
        }
    }

    /// Gate: degraded when evaluations hit their deadline.
    fn check_gate(snapshot: &HealthSnapshot) -> SubsystemHealth {
        let timeouts = snapshot.metrics.evaluation_timeouts;
        let (status, message) = if timeouts > 0 {
            (
                HealthStatus::Degraded,
                Some(format!("{timeouts} evaluations exceeded their deadline")),
            )
        } else {
            (HealthStatus::Healthy, None)
        };
        SubsystemHealth {
            name: "gate".into(),
            status,
            message,
        }
    }

    /// Alerting: degraded on any dropped alert.
    fn check_alerting(snapshot: &HealthSnapshot) -> SubsystemHealth {
        let dropped = snapshot.metrics.alerts_dropped;
        let (status, message) = if dropped > 0 {
            (
                HealthStatus::Degraded,
                Some(format!("{dropped} alerts dropped after retries")),
            )
        } else {
            (HealthStatus::Healthy, None)
        };
        SubsystemHealth {
            name: "alerting".into(),
            status,
            message,
        }
    }

    /// Persistence: backlog thresholds; in-memory mode is always healthy.
    fn check_persistence(snapshot: &HealthSnapshot) -> SubsystemHealth {
        let m = &snapshot.metrics;
        let (status, message) = if !snapshot.persistence_enabled {
            (HealthStatus::Healthy, Some("in-memory only".into()))
        } else if m.persistence_backlog >= PERSISTENCE_BACKLOG_UNHEALTHY {
            (
                HealthStatus::Unhealthy,
                Some(format!("{} records awaiting flush", m.persistence_backlog)),
            )
        } else if m.persistence_backlog >= PERSISTENCE_BACKLOG_DEGRADED
            || m.persistence_failures > 0
        {
            (
                HealthStatus::Degraded,
                Some(format!(
                    "{} records awaiting flush, {} failed flushes",
                    m.persistence_backlog, m.persistence_failures
                )),
            )
        } else {
            (HealthStatus::Healthy, None)
        };
        SubsystemHealth {
            name: "persistence".into(),
            status,
            message,
        }
    }
}
