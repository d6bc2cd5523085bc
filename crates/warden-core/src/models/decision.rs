use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::{Severity, Signal, SignalType};
use crate::errors::ConfigError;

/// Policy category. Each has its own independently tunable thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Critical,
    Security,
    Moderation,
    LowRisk,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Critical,
        Category::Security,
        Category::Moderation,
        Category::LowRisk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Security => "security",
            Self::Moderation => "moderation",
            Self::LowRisk => "low_risk",
        }
    }

    /// Map a signal onto its policy category.
    ///
    /// CRITICAL severity wins over type; threats are security; moderation
    /// flags are moderation; everything else is low risk.
    pub fn for_signal(signal: &Signal) -> Self {
        if signal.severity == Severity::Critical {
            return Self::Critical;
        }
        match signal.signal_type {
            SignalType::ThreatDetected => Self::Security,
            SignalType::ModerationFlag => Self::Moderation,
            _ => Self::LowRisk,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "critical" => Ok(Self::Critical),
            "security" => Ok(Self::Security),
            "moderation" => Ok(Self::Moderation),
            "low_risk" | "lowrisk" => Ok(Self::LowRisk),
            _ => Err(ConfigError::UnknownCategory {
                value: s.to_string(),
            }),
        }
    }
}

/// Gate outcome. Also used for human verdicts in the override ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Act,
    Abstain,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Act => "ACT",
            Self::Abstain => "ABSTAIN",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which threshold caused an abstention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstainReason {
    LowConfidence,
    HighUncertainty,
    InsufficientSamples,
    HighDisagreement,
}

/// The four tunable thresholds of one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_confidence: f64,
    pub max_uncertainty: f64,
    pub min_sample_count: u32,
    pub max_disagreement_rate: f64,
}

/// Names one field of [`Thresholds`] for runtime updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdField {
    MinConfidence,
    MaxUncertainty,
    MinSampleCount,
    MaxDisagreementRate,
}

impl ThresholdField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinConfidence => "min_confidence",
            Self::MaxUncertainty => "max_uncertainty",
            Self::MinSampleCount => "min_sample_count",
            Self::MaxDisagreementRate => "max_disagreement_rate",
        }
    }
}

impl fmt::Display for ThresholdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min_confidence" => Ok(Self::MinConfidence),
            "max_uncertainty" => Ok(Self::MaxUncertainty),
            "min_sample_count" => Ok(Self::MinSampleCount),
            "max_disagreement_rate" => Ok(Self::MaxDisagreementRate),
            _ => Err(ConfigError::UnknownThresholdField {
                value: s.to_string(),
            }),
        }
    }
}

impl Thresholds {
    /// Built-in defaults per category.
    pub fn default_for(category: Category) -> Self {
        match category {
            Category::Critical => Self {
                min_confidence: 0.95,
                max_uncertainty: 0.05,
                min_sample_count: 1,
                max_disagreement_rate: 0.10,
            },
            Category::Security => Self {
                min_confidence: 0.85,
                max_uncertainty: 0.15,
                min_sample_count: 1,
                max_disagreement_rate: 0.20,
            },
            Category::Moderation => Self {
                min_confidence: 0.75,
                max_uncertainty: 0.25,
                min_sample_count: 1,
                max_disagreement_rate: 0.25,
            },
            Category::LowRisk => Self {
                min_confidence: 0.60,
                max_uncertainty: 0.40,
                min_sample_count: 1,
                max_disagreement_rate: 0.40,
            },
        }
    }

    /// Return a copy with one field replaced, or a [`ConfigError`] leaving
    /// `self` untouched.
    pub fn with_field(&self, field: ThresholdField, value: f64) -> Result<Self, ConfigError> {
        let mut next = *self;
        match field {
            ThresholdField::MinSampleCount => {
                if !value.is_finite()
                    || value < 0.0
                    || value.fract() != 0.0
                    || value > f64::from(u32::MAX)
                {
                    return Err(ConfigError::InvalidSampleCount { value });
                }
                next.min_sample_count = value as u32;
            }
            ThresholdField::MinConfidence => next.min_confidence = check_rate(field, value)?,
            ThresholdField::MaxUncertainty => next.max_uncertainty = check_rate(field, value)?,
            ThresholdField::MaxDisagreementRate => {
                next.max_disagreement_rate = check_rate(field, value)?
            }
        }
        Ok(next)
    }

    /// Check every field is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            (ThresholdField::MinConfidence, self.min_confidence),
            (ThresholdField::MaxUncertainty, self.max_uncertainty),
            (ThresholdField::MaxDisagreementRate, self.max_disagreement_rate),
        ] {
            check_rate(field, value)?;
        }
        Ok(())
    }
}

fn check_rate(field: ThresholdField, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::ThresholdOutOfRange {
            field: field.to_string(),
            value,
        })
    }
}

/// Lifecycle of a decision.
///
/// `Pending → {Acted, Abstained}`; `Abstained → {Escalated, Overridden}`;
/// `Escalated → {Acknowledged, Overridden, Expired}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    Pending,
    Acted,
    Abstained,
    Escalated,
    Acknowledged,
    Overridden,
    Expired,
}

impl DecisionState {
    pub fn can_transition(self, to: DecisionState) -> bool {
        use DecisionState::*;
        matches!(
            (self, to),
            (Pending, Acted)
                | (Pending, Abstained)
                | (Abstained, Escalated)
                | (Abstained, Overridden)
                | (Escalated, Acknowledged)
                | (Escalated, Overridden)
                | (Escalated, Expired)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Acted | Self::Acknowledged | Self::Overridden | Self::Expired
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Acted => "ACTED",
            Self::Abstained => "ABSTAINED",
            Self::Escalated => "ESCALATED",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Overridden => "OVERRIDDEN",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for DecisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One gate evaluation. Immutable once created; carries the threshold
/// snapshot that was in force at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub signal_id: String,
    pub source: String,
    pub signal_type: SignalType,
    pub category: Category,
    pub confidence_snapshot: f64,
    pub uncertainty: f64,
    pub sample_count: u32,
    pub disagreement_rate: f64,
    pub threshold_snapshot: Thresholds,
    pub outcome: Outcome,
    pub reasons: Vec<AbstainReason>,
    pub created_at: DateTime<Utc>,
}
