//! Default notifier used when none is injected.

use warden_core::errors::DeliveryError;
use warden_core::models::AlertRecord;
use warden_core::traits::Notifier;

/// Writes every alert to the log at WARN. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: &AlertRecord) -> Result<(), DeliveryError> {
        tracing::warn!(
            alert_id = %alert.id,
            severity = alert.severity.as_str(),
            escalation_count = alert.escalation_count,
            decision_id = alert.decision_id().unwrap_or_default(),
            signal_id = alert.signal_id().unwrap_or_default(),
            "governance alert"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
