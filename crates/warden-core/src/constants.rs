/// Warden system version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable consulted for the tracing filter.
pub const LOG_ENV_VAR: &str = "WARDEN_LOG";

/// Prefix for generated signal ids.
pub const SIGNAL_ID_PREFIX: &str = "sig";
/// Prefix for generated decision ids.
pub const DECISION_ID_PREFIX: &str = "dec";
/// Prefix for generated override ids.
pub const OVERRIDE_ID_PREFIX: &str = "ovr";
/// Prefix for generated alert ids.
pub const ALERT_ID_PREFIX: &str = "alr";

/// Source name used for signals the governance core emits about itself.
pub const GOVERNANCE_SOURCE: &str = "warden.governance";

/// Bias-score tier boundaries (fractions of decisions overridden).
pub const BIAS_CRITICAL_ABOVE: f64 = 0.40;
pub const BIAS_HIGH_FROM: f64 = 0.25;
pub const BIAS_MEDIUM_FROM: f64 = 0.10;
