//! # warden-core
//!
//! Foundation crate for the Warden governance core.
//! Defines the signal/decision/override/alert data model, the error taxonomy,
//! configuration, the bounded history buffer, and the collaborator traits
//! (persistence, notification, clock). Every other crate in the workspace
//! depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod history;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::WardenConfig;
pub use errors::{WardenError, WardenResult};
pub use history::BoundedHistory;
pub use models::{
    AlertRecord, Category, Decision, DecisionState, FeatureFlag, FlagTier, OverrideRecord,
    Outcome, Severity, Signal, SignalPayload, SignalType, Thresholds,
};
