//! # warden-engine
//!
//! Owns every governance component and the background threads that serve
//! them. Build one with [`EngineBuilder`], talk to it through
//! [`GovernanceEngine`], and call [`GovernanceEngine::shutdown`] (or drop
//! it) to drain subscribers and flush pending records.

pub mod builder;
pub mod engine;
pub mod notifier;

pub use builder::EngineBuilder;
pub use engine::GovernanceEngine;
pub use notifier::LogNotifier;
