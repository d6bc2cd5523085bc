/// Supplies the recent human-disagreement rate for a signal source.
///
/// Implemented by the override ledger; the confidence gate only sees this trait.
pub trait DisagreementSource: Send + Sync {
    /// Fraction in [0,1] of the source's recent decisions overridden by a
    /// human with a different outcome. Zero when there is no history.
    fn recent_disagreement_rate(&self, source: &str) -> f64;
}

/// Source with no override history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDisagreement;

impl DisagreementSource for NoDisagreement {
    fn recent_disagreement_rate(&self, _source: &str) -> f64 {
        0.0
    }
}
