//! # warden-flags
//!
//! Runtime-toggleable capability gates. Reads are snapshot reads of an
//! `Arc` that writers swap wholesale, so a reader never observes a
//! partially-applied toggle.

pub mod catalog;
pub mod registry;

pub use catalog::{FlagEntry, ESCALATION_ALERTS_FLAG, FLAG_CATALOG};
pub use registry::{FeatureFlagRegistry, FlagSnapshot};
