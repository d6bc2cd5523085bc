use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::{AbstainReason, Category};
use crate::constants::SIGNAL_ID_PREFIX;
use crate::errors::ValidationError;

/// Ordered signal urgency. Comparisons use the numeric rank, never strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Numeric rank: INFO=0 … CRITICAL=4.
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// HIGH or CRITICAL.
    pub fn is_high(self) -> bool {
        self >= Severity::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(ValidationError::UnknownSeverity {
                value: s.to_string(),
            }),
        }
    }
}

/// Signal type tag. Every type has exactly one payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    ThreatDetected,
    AnomalyDetected,
    ModerationFlag,
    RateLimitExceeded,
    EscalationRequired,
    DroppedAlert,
    DecisionExpired,
    Custom,
}

impl SignalType {
    pub const ALL: [SignalType; 8] = [
        SignalType::ThreatDetected,
        SignalType::AnomalyDetected,
        SignalType::ModerationFlag,
        SignalType::RateLimitExceeded,
        SignalType::EscalationRequired,
        SignalType::DroppedAlert,
        SignalType::DecisionExpired,
        SignalType::Custom,
    ];

    /// Types produced by external detectors (as opposed to the governance
    /// core's own audit signals).
    pub const DETECTIONS: [SignalType; 5] = [
        SignalType::ThreatDetected,
        SignalType::AnomalyDetected,
        SignalType::ModerationFlag,
        SignalType::RateLimitExceeded,
        SignalType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThreatDetected => "THREAT_DETECTED",
            Self::AnomalyDetected => "ANOMALY_DETECTED",
            Self::ModerationFlag => "MODERATION_FLAG",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::EscalationRequired => "ESCALATION_REQUIRED",
            Self::DroppedAlert => "DROPPED_ALERT",
            Self::DecisionExpired => "DECISION_EXPIRED",
            Self::Custom => "CUSTOM",
        }
    }

    /// Whether this type is emitted by the governance core itself.
    pub fn is_governance(self) -> bool {
        matches!(
            self,
            Self::EscalationRequired | Self::DroppedAlert | Self::DecisionExpired
        )
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownSignalType {
                value: s.to_string(),
            })
    }
}

/// Detector-supplied evidence consumed by the confidence gate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Evidence {
    /// Detector's own uncertainty estimate in [0,1].
    pub uncertainty: Option<f64>,
    /// Number of observations backing the detection.
    pub sample_count: Option<u32>,
}

/// Typed payload, one variant per [`SignalType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalPayload {
    ThreatDetected {
        indicator: String,
        target: Option<String>,
        #[serde(default)]
        evidence: Evidence,
    },
    AnomalyDetected {
        metric: String,
        observed: f64,
        baseline: f64,
        #[serde(default)]
        evidence: Evidence,
    },
    ModerationFlag {
        subject_id: String,
        rule: String,
        #[serde(default)]
        evidence: Evidence,
    },
    RateLimitExceeded {
        subject_id: String,
        count: u64,
        window_secs: u64,
    },
    EscalationRequired {
        decision_id: String,
        category: Category,
        reasons: Vec<AbstainReason>,
    },
    DroppedAlert {
        alert_id: String,
        attempts: u32,
        last_error: String,
    },
    DecisionExpired {
        decision_id: String,
        escalation_count: u32,
    },
    Custom {
        name: String,
        fields: serde_json::Value,
    },
}

impl SignalPayload {
    /// The signal type this payload shape belongs to.
    pub fn signal_type(&self) -> SignalType {
        match self {
            Self::ThreatDetected { .. } => SignalType::ThreatDetected,
            Self::AnomalyDetected { .. } => SignalType::AnomalyDetected,
            Self::ModerationFlag { .. } => SignalType::ModerationFlag,
            Self::RateLimitExceeded { .. } => SignalType::RateLimitExceeded,
            Self::EscalationRequired { .. } => SignalType::EscalationRequired,
            Self::DroppedAlert { .. } => SignalType::DroppedAlert,
            Self::DecisionExpired { .. } => SignalType::DecisionExpired,
            Self::Custom { .. } => SignalType::Custom,
        }
    }

    pub fn evidence(&self) -> Option<&Evidence> {
        match self {
            Self::ThreatDetected { evidence, .. }
            | Self::AnomalyDetected { evidence, .. }
            | Self::ModerationFlag { evidence, .. } => Some(evidence),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(evidence) = self.evidence() {
            if let Some(u) = evidence.uncertainty {
                if !(0.0..=1.0).contains(&u) {
                    return Err(ValidationError::UncertaintyOutOfRange { value: u });
                }
            }
        }
        match self {
            Self::ThreatDetected { indicator, .. } if indicator.trim().is_empty() => {
                Err(ValidationError::EmptyField { field: "indicator" })
            }
            Self::AnomalyDetected { metric, .. } if metric.trim().is_empty() => {
                Err(ValidationError::EmptyField { field: "metric" })
            }
            Self::ModerationFlag { subject_id, .. } | Self::RateLimitExceeded { subject_id, .. }
                if subject_id.trim().is_empty() =>
            {
                Err(ValidationError::EmptyField { field: "subject_id" })
            }
            Self::EscalationRequired { decision_id, .. }
            | Self::DecisionExpired { decision_id, .. }
                if decision_id.is_empty() =>
            {
                Err(ValidationError::EmptyField { field: "decision_id" })
            }
            Self::Custom { name, .. } if name.trim().is_empty() => {
                Err(ValidationError::EmptyField { field: "name" })
            }
            Self::Custom { fields, .. } if !fields.is_object() => {
                Err(ValidationError::CustomPayloadNotObject)
            }
            _ => Ok(()),
        }
    }
}

/// An immutable record of a detected event.
///
/// `dedup_key` may be left empty by producers; the bus derives one from the
/// content hash at emit time. `sequence` is assigned by the bus on acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub signal_type: SignalType,
    pub severity: Severity,
    pub source: String,
    pub payload: SignalPayload,
    pub confidence: f64,
    pub dedup_key: String,
    pub correlation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sequence: u64,
}

impl Signal {
    /// Start building a signal. The type is taken from the payload variant.
    pub fn builder(
        severity: Severity,
        source: impl Into<String>,
        payload: SignalPayload,
    ) -> SignalBuilder {
        SignalBuilder {
            severity,
            source: source.into(),
            payload,
            confidence: 1.0,
            dedup_key: None,
            correlation_id: None,
            timestamp: None,
        }
    }

    /// Check ranges and payload/type agreement.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ValidationError::ConfidenceOutOfRange {
                value: self.confidence,
            });
        }
        if self.source.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "source" });
        }
        let payload_type = self.payload.signal_type();
        if payload_type != self.signal_type {
            return Err(ValidationError::PayloadMismatch {
                signal_type: self.signal_type.to_string(),
                payload: payload_type.to_string(),
            });
        }
        self.payload.validate()
    }

    /// Content hash of `(type, source, payload)`, used when no key is supplied.
    pub fn derive_dedup_key(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.signal_type.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.source.as_bytes());
        hasher.update(b"\x1f");
        let payload = serde_json::to_vec(&self.payload).unwrap_or_default();
        hasher.update(&payload);
        hasher.finalize().to_hex().to_string()
    }

    /// Evidence-supplied uncertainty, else `1 - confidence`.
    pub fn uncertainty(&self) -> f64 {
        self.payload
            .evidence()
            .and_then(|e| e.uncertainty)
            .unwrap_or(1.0 - self.confidence)
    }
}

/// Builder for [`Signal`].
#[derive(Debug, Clone)]
pub struct SignalBuilder {
    severity: Severity,
    source: String,
    payload: SignalPayload,
    confidence: f64,
    dedup_key: Option<String>,
    correlation_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl SignalBuilder {
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Finish the signal. Validation happens at emit.
    pub fn build(self) -> Signal {
        Signal {
            id: format!("{}-{}", SIGNAL_ID_PREFIX, Uuid::new_v4()),
            signal_type: self.payload.signal_type(),
            severity: self.severity,
            source: self.source,
            payload: self.payload,
            confidence: self.confidence,
            dedup_key: self.dedup_key.unwrap_or_default(),
            correlation_id: self.correlation_id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            sequence: 0,
        }
    }
}
