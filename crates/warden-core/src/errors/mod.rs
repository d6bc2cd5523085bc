mod config_error;
mod delivery_error;
mod governance_error;
mod persistence_error;
mod subscriber_error;
mod validation_error;
mod warden_error;

pub use config_error::ConfigError;
pub use delivery_error::DeliveryError;
pub use governance_error::GovernanceError;
pub use persistence_error::PersistenceError;
pub use subscriber_error::SubscriberError;
pub use validation_error::ValidationError;
pub use warden_error::{WardenError, WardenResult};
