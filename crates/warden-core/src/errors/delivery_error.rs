/// Alert sink delivery failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeliveryError {
    #[error("notifier unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("notification timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("delivery failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("notifier rejected alert: {reason}")]
    Rejected { reason: String },
}
