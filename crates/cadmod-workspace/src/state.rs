//! Workspace lifecycle state machine
//!
//! `Uninitialized → Active → PendingCleanup → {Cleaned | CleanupFailed}`.
//! Nothing skips `Active`, and both cleanup outcomes are terminal.

use crate::error::WorkspaceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a workspace directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceState {
    /// Directory reserved, copy not finished
    Uninitialized,
    /// Copy complete; changes may be applied
    Active,
    /// Teardown in progress
    PendingCleanup,
    /// Directory removed
    Cleaned,
    /// Every teardown strategy failed; a residual directory remains
    CleanupFailed,
}

impl WorkspaceState {
    /// True once no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cleaned | Self::CleanupFailed)
    }
}

impl fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::PendingCleanup => "pending_cleanup",
            Self::Cleaned => "cleaned",
            Self::CleanupFailed => "cleanup_failed",
        };
        f.write_str(s)
    }
}

/// Validate a state transition
///
/// # Errors
/// `WorkspaceError::IllegalTransition` when `to` is not reachable from `from`
pub fn validate_transition(from: WorkspaceState, to: WorkspaceState) -> Result<(), WorkspaceError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(WorkspaceError::IllegalTransition { from, to })
    }
}

/// States reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: WorkspaceState) -> Vec<WorkspaceState> {
    use WorkspaceState::*;
    match from {
        Uninitialized => vec![Active],
        Active => vec![PendingCleanup],
        PendingCleanup => vec![Cleaned, CleanupFailed],
        Cleaned | CleanupFailed => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use WorkspaceState::*;

    const ALL: [WorkspaceState; 5] = [Uninitialized, Active, PendingCleanup, Cleaned, CleanupFailed];

    #[test]
    fn happy_path() {
        assert!(validate_transition(Uninitialized, Active).is_ok());
        assert!(validate_transition(Active, PendingCleanup).is_ok());
        assert!(validate_transition(PendingCleanup, Cleaned).is_ok());
        assert!(validate_transition(PendingCleanup, CleanupFailed).is_ok());
    }

    #[test]
    fn cannot_skip_active() {
        assert!(validate_transition(Uninitialized, PendingCleanup).is_err());
        assert!(validate_transition(Uninitialized, Cleaned).is_err());
        assert!(validate_transition(Active, Cleaned).is_err());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for state in ALL.iter().copied().filter(|s| s.is_terminal()) {
            assert!(allowed_transitions(state).is_empty());
        }
    }

    proptest! {
        #[test]
        fn random_walks_never_leave_terminal(steps in prop::collection::vec(0usize..5, 0..20)) {
            let mut state = Uninitialized;
            let mut reached_terminal = false;
            for idx in steps {
                let next = ALL[idx];
                if validate_transition(state, next).is_ok() {
                    prop_assert!(!reached_terminal);
                    state = next;
                    reached_terminal = state.is_terminal();
                }
            }
        }
    }
}
