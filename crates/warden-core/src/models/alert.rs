use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::Severity;

/// What an alert is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AlertTarget {
    Decision(String),
    Signal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Dropped,
}

/// An alert built by the escalation sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub target: AlertTarget,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub acknowledged: bool,
    pub escalation_count: u32,
    pub attempts: u32,
    pub delivery: DeliveryStatus,
    /// Escalation finished: expired, or its decision was resolved elsewhere.
    #[serde(default)]
    pub closed: bool,
}

impl AlertRecord {
    pub fn new(id: String, target: AlertTarget, severity: Severity, now: DateTime<Utc>) -> Self {
        Self {
            id,
            target,
            severity,
            created_at: now,
            delivered_at: None,
            last_notified_at: None,
            acknowledged: false,
            escalation_count: 0,
            attempts: 0,
            delivery: DeliveryStatus::Pending,
            closed: false,
        }
    }

    pub fn decision_id(&self) -> Option<&str> {
        match &self.target {
            AlertTarget::Decision(id) => Some(id),
            AlertTarget::Signal(_) => None,
        }
    }

    pub fn signal_id(&self) -> Option<&str> {
        match &self.target {
            AlertTarget::Signal(id) => Some(id),
            AlertTarget::Decision(_) => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        self.delivery == DeliveryStatus::Dropped
    }
}
