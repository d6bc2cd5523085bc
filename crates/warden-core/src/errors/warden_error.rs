use super::{
    ConfigError, DeliveryError, GovernanceError, PersistenceError, SubscriberError,
    ValidationError,
};

/// Top-level error for the governance core.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("subscriber error: {0}")]
    Subscriber(#[from] SubscriberError),

    #[error("governance error: {0}")]
    Governance(#[from] GovernanceError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type WardenResult<T> = Result<T, WardenError>;
