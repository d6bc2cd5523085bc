use crate::models::DecisionState;

/// Errors raised by the decision lifecycle and ledger.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GovernanceError {
    #[error("decision not found: {id}")]
    DecisionNotFound { id: String },

    #[error("alert not found: {id}")]
    AlertNotFound { id: String },

    #[error("invalid decision transition for {decision_id}: {from} -> {to}")]
    InvalidTransition {
        decision_id: String,
        from: DecisionState,
        to: DecisionState,
    },

    #[error("evaluation of signal {signal_id} exceeded deadline of {deadline_ms}ms")]
    DeadlineExceeded { signal_id: String, deadline_ms: u64 },

    #[error("subscription not found: {handle}")]
    SubscriptionNotFound { handle: u64 },
}
