/// Malformed input rejected synchronously. No side effects have occurred.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("confidence must be in [0,1], got {value}")]
    ConfidenceOutOfRange { value: f64 },

    #[error("uncertainty must be in [0,1], got {value}")]
    UncertaintyOutOfRange { value: f64 },

    #[error("unknown severity: {value}")]
    UnknownSeverity { value: String },

    #[error("unknown signal type: {value}")]
    UnknownSignalType { value: String },

    #[error("payload does not match signal type {signal_type}: got {payload} payload")]
    PayloadMismatch {
        signal_type: String,
        payload: String,
    },

    #[error("field {field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("custom payload must be a JSON object")]
    CustomPayloadNotObject,
}
