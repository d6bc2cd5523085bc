use serde::{Deserialize, Serialize};

/// Health report across governance subsystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub subsystems: Vec<SubsystemHealth>,
    pub metrics: HealthMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub signals_accepted: u64,
    pub signals_suppressed: u64,
    pub subscriber_failures: u64,
    pub subscriber_drops: u64,
    pub decisions: u64,
    pub abstentions: u64,
    pub evaluation_timeouts: u64,
    pub alerts_dropped: u64,
    pub persistence_backlog: usize,
    pub persistence_failures: u64,
}
