use warden_core::models::{HealthMetrics, HealthStatus};
use warden_observability::{HealthReporter, HealthSnapshot};

#[test]
fn health_report_includes_all_subsystem_statuses() {
    let report = HealthReporter::build(&HealthSnapshot::default());
    let names: Vec<&str> = report.subsystems.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["bus", "gate", "alerting", "persistence"]);
    assert_eq!(report.overall_status, HealthStatus::Healthy);
}

#[test]
fn dropped_alerts_degrade_overall_health() {
    let snapshot = HealthSnapshot {
        metrics: HealthMetrics {
            signals_accepted: 100,
            alerts_dropped: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let report = HealthReporter::build(&snapshot);
    assert_eq!(report.overall_status, HealthStatus::Degraded);
    let alerting = report
        .subsystems
        .iter()
        .find(|s| s.name == "alerting")
        .unwrap();
    assert_eq!(alerting.status, HealthStatus::Degraded);
}

#[test]
fn heavy_subscriber_drops_make_bus_unhealthy() {
    let snapshot = HealthSnapshot {
        metrics: HealthMetrics {
            signals_accepted: 100,
            subscriber_drops: 40,
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(
        HealthReporter::build(&snapshot).overall_status,
        HealthStatus::Unhealthy
    );
}

#[test]
fn persistence_backlog_only_counts_when_enabled() {
    let mut snapshot = HealthSnapshot {
        metrics: HealthMetrics {
            persistence_backlog: 50_000,
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(
        HealthReporter::build(&snapshot).overall_status,
        HealthStatus::Healthy
    );
    snapshot.persistence_enabled = true;
    assert_eq!(
        HealthReporter::build(&snapshot).overall_status,
        HealthStatus::Unhealthy
    );
}
