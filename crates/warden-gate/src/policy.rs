//! The abstention policy. Pure: identical inputs and thresholds always
//! produce the identical verdict.

use serde::{Deserialize, Serialize};
use warden_core::models::{AbstainReason, Outcome, Thresholds};

/// Everything the policy looks at for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateInput {
    pub confidence: f64,
    pub uncertainty: f64,
    pub sample_count: u32,
    pub disagreement_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub outcome: Outcome,
    /// Every threshold that tripped, in check order. Empty for ACT.
    pub reasons: Vec<AbstainReason>,
}

/// Abstain if any threshold trips, act otherwise.
pub fn evaluate_policy(input: &GateInput, thresholds: &Thresholds) -> PolicyVerdict {
    let mut reasons = Vec::new();
    if input.confidence < thresholds.min_confidence {
        reasons.push(AbstainReason::LowConfidence);
    }
    if input.uncertainty > thresholds.max_uncertainty {
        reasons.push(AbstainReason::HighUncertainty);
    }
    if input.sample_count < thresholds.min_sample_count {
        reasons.push(AbstainReason::InsufficientSamples);
    }
    if input.disagreement_rate > thresholds.max_disagreement_rate {
        reasons.push(AbstainReason::HighDisagreement);
    }
    let outcome = if reasons.is_empty() {
        Outcome::Act
    } else {
        Outcome::Abstain
    };
    PolicyVerdict { outcome, reasons }
}
