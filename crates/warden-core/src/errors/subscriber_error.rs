/// A subscriber failed to take or process a signal. Isolated per subscriber.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubscriberError {
    #[error("handler failed: {reason}")]
    HandlerFailed { reason: String },

    #[error("handler panicked: {message}")]
    HandlerPanicked { message: String },

    #[error("subscriber {subscriber} queue full (capacity {capacity})")]
    QueueFull { subscriber: String, capacity: usize },

    #[error("subscriber {subscriber} is closed")]
    Closed { subscriber: String },

    #[error("failed to start worker for {subscriber}: {reason}")]
    WorkerSpawn { subscriber: String, reason: String },
}

impl SubscriberError {
    /// Convenience constructor for handler failures.
    pub fn handler(reason: impl Into<String>) -> Self {
        Self::HandlerFailed {
            reason: reason.into(),
        }
    }
}
