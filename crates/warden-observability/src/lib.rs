//! # warden-observability
//!
//! Structured tracing with one event helper per governance operation, and
//! health reporting across the bus, gate, alerting, and persistence subsystems.

pub mod health;
pub mod tracing_setup;

pub use health::{HealthReporter, HealthSnapshot};
pub use tracing_setup::{init_tracing, init_tracing_with_filter};
