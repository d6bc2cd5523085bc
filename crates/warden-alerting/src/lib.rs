//! # warden-alerting
//!
//! Turns abstentions and unacknowledged high-severity signals into
//! [`AlertRecord`]s and pushes them through an injected
//! [`Notifier`], with bounded retries, per-attempt deadlines, CRITICAL
//! re-notification, and decision expiry.
//!
//! [`AlertRecord`]: warden_core::models::AlertRecord
//! [`Notifier`]: warden_core::traits::Notifier

pub mod delivery;
pub mod sink;
pub mod ticker;

pub use delivery::{DeliveryPolicy, DeliveryReport};
pub use sink::{AlertSink, AlertStats, TickReport};
pub use ticker::Ticker;
