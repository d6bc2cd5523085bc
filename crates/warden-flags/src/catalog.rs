//! Built-in flag catalog: every detector capability with its tier and default.

use warden_core::models::FlagTier;

/// A catalog flag with its tier and default state.
#[derive(Debug, Clone)]
pub struct FlagEntry {
    /// Flag identifier.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    pub tier: FlagTier,
    pub default_enabled: bool,
}

/// The default flag catalog seeded into a fresh registry.
/// Gates alert delivery for escalated decisions.
pub const ESCALATION_ALERTS_FLAG: &str = "escalation_alerts";

pub const FLAG_CATALOG: &[FlagEntry] = &[
    // --- Baseline detectors ---
    FlagEntry {
        name: "keyword_detection",
        description: "Keyword list matching",
        tier: FlagTier::Baseline,
        default_enabled: true,
    },
    FlagEntry {
        name: "regex_detection",
        description: "Regular-expression pattern matching",
        tier: FlagTier::Baseline,
        default_enabled: true,
    },
    FlagEntry {
        name: "wallet_detection",
        description: "Crypto wallet address matching",
        tier: FlagTier::Baseline,
        default_enabled: true,
    },
    FlagEntry {
        name: "rate_limit_detection",
        description: "Message and join rate limiting",
        tier: FlagTier::Baseline,
        default_enabled: true,
    },
    // --- Governance ---
    FlagEntry {
        name: ESCALATION_ALERTS_FLAG,
        description: "Alert delivery for abstained decisions",
        tier: FlagTier::Baseline,
        default_enabled: true,
    },
    // --- Advanced ---
    FlagEntry {
        name: "advanced_ml_detection",
        description: "Model-based threat classification",
        tier: FlagTier::Advanced,
        default_enabled: true,
    },
    FlagEntry {
        name: "anomaly_detection",
        description: "Statistical anomaly detection on activity metrics",
        tier: FlagTier::Advanced,
        default_enabled: true,
    },
    FlagEntry {
        name: "auto_moderation",
        description: "Automated moderation actions",
        tier: FlagTier::Advanced,
        default_enabled: false,
    },
];
