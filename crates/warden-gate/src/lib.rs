//! # warden-gate
//!
//! Gates autonomous action behind per-category confidence thresholds.
//! Every evaluated detection yields exactly one immutable [`Decision`];
//! abstentions are re-emitted on the bus as `ESCALATION_REQUIRED`.
//!
//! [`Decision`]: warden_core::models::Decision

pub mod gate;
pub mod policy;
pub mod store;
pub mod thresholds;

pub use gate::{ConfidenceGate, GateStats};
pub use policy::{evaluate_policy, GateInput, PolicyVerdict};
pub use store::DecisionStore;
pub use thresholds::ThresholdRegistry;
