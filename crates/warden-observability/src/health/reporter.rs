//! Aggregate health report generation.

use warden_core::models::{HealthMetrics, HealthReport, HealthStatus, SubsystemHealth};

use super::subsystem_checks::SubsystemChecker;

/// Snapshot of subsystem counters used to build a health report.
#[derive(Debug, Clone, Default)]
pub struct HealthSnapshot {
    pub metrics: HealthMetrics,
    pub subscriber_count: usize,
    /// Signals queued across all subscriber queues.
    pub queued_signals: usize,
    pub persistence_enabled: bool,
}

/// Builds a [`HealthReport`] from a snapshot.
pub struct HealthReporter;

impl HealthReporter {
    pub fn build(snapshot: &HealthSnapshot) -> HealthReport {
        let subsystems = SubsystemChecker::check_all(snapshot);
        let overall_status = Self::derive_overall(&subsystems);
        HealthReport {
            overall_status,
            subsystems,
            metrics: snapshot.metrics.clone(),
        }
    }

    /// Unhealthy if any subsystem is unhealthy, degraded if any is degraded.
    fn derive_overall(subsystems: &[SubsystemHealth]) -> HealthStatus {
        let mut worst = HealthStatus::Healthy;
        for s in subsystems {
            match s.status {
                HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
                HealthStatus::Degraded => worst = HealthStatus::Degraded,
                HealthStatus::Healthy => {}
            }
        }
        worst
    }
}
