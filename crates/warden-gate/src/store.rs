//! [`DecisionStore`]: bounded decision history plus lifecycle state.

use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;
use warden_core::errors::GovernanceError;
use warden_core::history::BoundedHistory;
use warden_core::models::{Decision, DecisionState, Outcome};

/// Decisions are immutable; only their [`DecisionState`] moves, and only
/// along the allowed transitions. Evicted decisions lose their state too.
#[derive(Debug)]
pub struct DecisionStore {
    history: Mutex<BoundedHistory<Decision>>,
    states: DashMap<String, DecisionState>,
}

impl DecisionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: Mutex::new(BoundedHistory::new(capacity)),
            states: DashMap::new(),
        }
    }

    /// Store a freshly evaluated decision in `Acted` or `Abstained`.
    pub fn record(&self, decision: Decision) {
        let state = match decision.outcome {
            Outcome::Act => DecisionState::Acted,
            Outcome::Abstain => DecisionState::Abstained,
        };
        let id = decision.id.clone();
        let evicted = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decision);
        if let Some(evicted) = evicted {
            self.states.remove(&evicted.id);
        }
        self.states.insert(id, state);
    }

    pub fn get(&self, decision_id: &str) -> Option<Decision> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find(|d| d.id == decision_id)
            .cloned()
    }

    pub fn state(&self, decision_id: &str) -> Option<DecisionState> {
        self.states.get(decision_id).map(|s| *s)
    }

    /// Move a decision to `to`. Disallowed transitions leave the state
    /// untouched. Returns the previous state.
    pub fn transition(
        &self,
        decision_id: &str,
        to: DecisionState,
    ) -> Result<DecisionState, GovernanceError> {
        let mut state = self
            .states
            .get_mut(decision_id)
            .ok_or_else(|| GovernanceError::DecisionNotFound {
                id: decision_id.to_string(),
            })?;
        let from = *state;
        if !from.can_transition(to) {
            return Err(GovernanceError::InvalidTransition {
                decision_id: decision_id.to_string(),
                from,
                to,
            });
        }
        *state = to;
        Ok(from)
    }

    /// Every retained decision, oldest first.
    pub fn all(&self) -> Vec<Decision> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    /// Ids of retained decisions matching `predicate`, filtered in place.
    pub fn ids_where(&self, predicate: impl Fn(&Decision) -> bool) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|d| predicate(d))
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn recent(&self, n: usize) -> Vec<Decision> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent(n)
    }

    pub fn len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of retained decisions currently in `state`.
    pub fn count_in(&self, state: DecisionState) -> usize {
        self.states.iter().filter(|e| *e.value() == state).count()
    }
}
