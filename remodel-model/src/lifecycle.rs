//! Fetch lifecycle flags.
//!
//! Each record tracks two independent operation classes, `Fetch` (reads)
//! and `Save` (create/update/delete). Each class moves
//! `Idle -> InProgress -> {Success, Failure}`; `Fetch` additionally keeps a
//! sticky `fetched_once` flag that is never cleared.

use serde::{Deserialize, Serialize};

/// Operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Fetch,
    Save,
}

/// Derived phase of one operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    InProgress,
    Success,
    Failure,
}

/// Raw flags of one operation class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationState {
    pub in_progress: bool,
    pub success: bool,
    pub failure: bool,
}

impl OperationState {
    pub fn phase(&self) -> Phase {
        if self.in_progress {
            Phase::InProgress
        } else if self.failure {
            Phase::Failure
        } else if self.success {
            Phase::Success
        } else {
            Phase::Idle
        }
    }
}

/// Lifecycle flags of one entity or collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub fetch: OperationState,
    pub save: OperationState,
    /// Set by the first successful fetch, never reset.
    pub fetched_once: bool,
}

impl Lifecycle {
    pub fn state(&self, op: Operation) -> &OperationState {
        match op {
            Operation::Fetch => &self.fetch,
            Operation::Save => &self.save,
        }
    }

    fn state_mut(&mut self, op: Operation) -> &mut OperationState {
        match op {
            Operation::Fetch => &mut self.fetch,
            Operation::Save => &mut self.save,
        }
    }

    pub fn phase(&self, op: Operation) -> Phase {
        self.state(op).phase()
    }

    /// Operation started: in progress, previous outcome cleared.
    pub fn begin(&mut self, op: Operation) {
        *self.state_mut(op) = OperationState {
            in_progress: true,
            success: false,
            failure: false,
        };
    }

    pub fn succeed(&mut self, op: Operation) {
        let state = self.state_mut(op);
        state.in_progress = false;
        state.success = true;
        state.failure = false;
        if op == Operation::Fetch {
            self.fetched_once = true;
        }
    }

    pub fn fail(&mut self, op: Operation) {
        let state = self.state_mut(op);
        state.in_progress = false;
        state.success = false;
        state.failure = true;
    }

    /// True while either class is in flight.
    pub fn is_busy(&self) -> bool {
        self.fetch.in_progress || self.save.in_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetched_once_survives_later_failure() {
        let mut lc = Lifecycle::default();
        lc.begin(Operation::Fetch);
        lc.succeed(Operation::Fetch);
        lc.begin(Operation::Fetch);
        assert!(lc.fetched_once);
        assert!(!lc.fetch.success);
        lc.fail(Operation::Fetch);
        assert!(lc.fetched_once);
        assert_eq!(lc.phase(Operation::Fetch), Phase::Failure);
    }

    #[test]
    fn classes_are_independent() {
        let mut lc = Lifecycle::default();
        lc.begin(Operation::Save);
        assert_eq!(lc.phase(Operation::Save), Phase::InProgress);
        assert_eq!(lc.phase(Operation::Fetch), Phase::Idle);
        lc.succeed(Operation::Save);
        assert!(!lc.fetched_once);
    }
}
