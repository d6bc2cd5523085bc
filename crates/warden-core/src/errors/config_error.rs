/// An administrative setter or config file supplied an invalid value.
/// The previous value is always retained.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("threshold {field} must be in [0,1], got {value}")]
    ThresholdOutOfRange { field: String, value: f64 },

    #[error("sample count must be a non-negative integer, got {value}")]
    InvalidSampleCount { value: f64 },

    #[error("unknown feature flag: {name}")]
    UnknownFlag { name: String },

    #[error("feature flag already registered: {name}")]
    DuplicateFlag { name: String },

    #[error("unknown category: {value}")]
    UnknownCategory { value: String },

    #[error("unknown threshold field: {value}")]
    UnknownThresholdField { value: String },

    #[error("invalid config value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },
}
