use crate::errors::DeliveryError;
use crate::models::AlertRecord;

/// Outbound alert channel (owner DM, audit channel, pager, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &AlertRecord) -> Result<(), DeliveryError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "notifier"
    }
}
