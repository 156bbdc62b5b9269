//! Transition tables for phases and plans.

use crate::error::PlanError;
use crate::state::State;

/// Returns `true` if a phase may move from `from` to `to`.
#[must_use]
pub fn can_transition_phase(from: State, to: State) -> bool {
    matches!(
        (from, to),
        (State::Unstarted, State::InProgress)
            | (State::InProgress, State::Completed)
            | (State::InProgress, State::Failed)
            | (State::Completed, State::RolledBack)
    )
}

/// Returns `true` if a plan may move from `from` to `to`.
#[must_use]
pub fn can_transition_plan(from: State, to: State) -> bool {
    matches!(
        (from, to),
        (State::Unstarted, State::InProgress)
            | (State::InProgress, State::Completed)
            | (State::InProgress, State::Failed)
            | (State::Failed, State::RolledBack)
    )
}

/// Validate a phase transition, naming the phase in the error.
pub fn validate_phase_transition(subject: &str, from: State, to: State) -> Result<(), PlanError> {
    if can_transition_phase(from, to) {
        Ok(())
    } else {
        Err(PlanError::InvalidTransition {
            subject: subject.to_owned(),
            from,
            to,
        })
    }
}

/// Validate a plan-level transition.
pub fn validate_plan_transition(from: State, to: State) -> Result<(), PlanError> {
    if can_transition_plan(from, to) {
        Ok(())
    } else {
        Err(PlanError::InvalidTransition {
            subject: "plan".to_owned(),
            from,
            to,
        })
    }
}
