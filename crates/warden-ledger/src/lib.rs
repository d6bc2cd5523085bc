//! # warden-ledger
//!
//! Append-only record of human verdicts on automated decisions, and the
//! bias and trend analysis built on it. Also feeds the confidence gate its
//! per-source disagreement rate.

pub mod bias;
pub mod ledger;
pub mod trend;

pub use bias::{BiasScore, RiskTier};
pub use ledger::{DisagreementPattern, OverrideLedger, OverrideStats};
pub use trend::{compute_trend, ConfidenceTrend, TrendDirection};
