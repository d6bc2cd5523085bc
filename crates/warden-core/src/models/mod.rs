mod alert;
mod decision;
mod flag;
mod health_report;
mod override_record;
mod signal;

pub use alert::{AlertRecord, AlertTarget, DeliveryStatus};
pub use decision::{
    AbstainReason, Category, Decision, DecisionState, Outcome, ThresholdField, Thresholds,
};
pub use flag::{FeatureFlag, FlagTier};
pub use health_report::{HealthMetrics, HealthReport, HealthStatus, SubsystemHealth};
pub use override_record::OverrideRecord;
pub use signal::{Evidence, Severity, Signal, SignalBuilder, SignalPayload, SignalType};
