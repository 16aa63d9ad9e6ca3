//! Per-request LLM attempt lifecycle:
//! Idle → FirstAttempt → Verifying → (Retrying) → Accepted, or Failed when
//! the first call errors. One retry at most; the retry is always accepted.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttemptState {
    Idle,
    FirstAttempt,
    Verifying,
    Retrying,
    Accepted,
    Failed,
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptState::Idle => write!(f, "Idle"),
            AttemptState::FirstAttempt => write!(f, "FirstAttempt"),
            AttemptState::Verifying => write!(f, "Verifying"),
            AttemptState::Retrying => write!(f, "Retrying"),
            AttemptState::Accepted => write!(f, "Accepted"),
            AttemptState::Failed => write!(f, "Failed"),
        }
    }
}

impl AttemptState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: AttemptState) -> bool {
        matches!(
            (self, next),
            (AttemptState::Idle, AttemptState::FirstAttempt)
                | (AttemptState::FirstAttempt, AttemptState::Verifying)
                | (AttemptState::FirstAttempt, AttemptState::Accepted) // nothing to verify
                | (AttemptState::FirstAttempt, AttemptState::Failed) // call error
                | (AttemptState::Verifying, AttemptState::Retrying)
                | (AttemptState::Verifying, AttemptState::Accepted)
                | (AttemptState::Retrying, AttemptState::Accepted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptState::Accepted | AttemptState::Failed)
    }
}

/// Tracks one request's attempts. Not shared between requests.
#[derive(Debug)]
pub struct AttemptMachine {
    state: AttemptState,
    llm_calls: u8,
}

impl AttemptMachine {
    pub const MAX_LLM_CALLS: u8 = 2;

    pub fn new() -> Self {
        Self {
            state: AttemptState::Idle,
            llm_calls: 0,
        }
    }

    pub fn current(&self) -> AttemptState {
        self.state
    }

    pub fn llm_calls(&self) -> u8 {
        self.llm_calls
    }

    /// Whether a corrective retry is still allowed.
    pub fn can_retry(&self) -> bool {
        self.state == AttemptState::Verifying && self.llm_calls < Self::MAX_LLM_CALLS
    }

    /// Attempt a state transition. Returns Ok(new_state) or Err with reason.
    pub fn transition(&mut self, next: AttemptState) -> Result<AttemptState, String> {
        let current = self.state;
        if !current.can_transition_to(next) {
            let msg = format!("invalid transition: {} -> {}", current, next);
            warn!("{}", msg);
            return Err(msg);
        }
        if matches!(next, AttemptState::FirstAttempt | AttemptState::Retrying) {
            self.llm_calls += 1;
        }
        self.state = next;
        debug!(from = %current, to = %next, llm_calls = self.llm_calls, "attempt_transition");
        Ok(next)
    }
}

impl Default for AttemptMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_with_retry() {
        let mut m = AttemptMachine::new();
        m.transition(AttemptState::FirstAttempt).unwrap();
        m.transition(AttemptState::Verifying).unwrap();
        assert!(m.can_retry());
        m.transition(AttemptState::Retrying).unwrap();
        m.transition(AttemptState::Accepted).unwrap();
        assert_eq!(m.llm_calls(), 2);
        assert!(m.current().is_terminal());
    }

    #[test]
    fn test_second_retry_is_rejected() {
        let mut m = AttemptMachine::new();
        m.transition(AttemptState::FirstAttempt).unwrap();
        m.transition(AttemptState::Verifying).unwrap();
        m.transition(AttemptState::Retrying).unwrap();
        assert!(!m.can_retry());
        assert!(m.transition(AttemptState::Verifying).is_err());
        assert!(m.transition(AttemptState::Retrying).is_err());
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut m = AttemptMachine::new();
        m.transition(AttemptState::FirstAttempt).unwrap();
        m.transition(AttemptState::Failed).unwrap();
        assert!(m.current().is_terminal());
        assert!(m.transition(AttemptState::Retrying).is_err());
    }

    #[test]
    fn test_cannot_skip_first_attempt() {
        assert!(!AttemptState::Idle.can_transition_to(AttemptState::Verifying));
        assert!(!AttemptState::Accepted.can_transition_to(AttemptState::FirstAttempt));
    }
}
