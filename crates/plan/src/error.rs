//! Plan model errors.

use gantry_core::PhaseId;
use thiserror::Error;

use crate::state::State;

/// Errors raised while building, validating, or mutating a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Two phases share the same id.
    #[error("duplicate phase id: {0}")]
    DuplicatePhase(PhaseId),

    /// A dependency names a phase that is not part of the plan.
    #[error("phase {phase} depends on unknown phase {dependency}")]
    InvalidReference {
        /// The phase declaring the dependency.
        phase: PhaseId,
        /// The missing dependency.
        dependency: PhaseId,
    },

    /// The dependency relation contains a cycle.
    #[error("cyclic dependency: {}", render_cycle(.cycle))]
    CyclicDependency {
        /// One offending cycle; the first id is repeated at the end.
        cycle: Vec<PhaseId>,
    },

    /// A lookup named a phase that is not part of the plan.
    #[error("unknown phase: {0}")]
    UnknownPhase(PhaseId),

    /// A state change not permitted by the transition table.
    #[error("invalid {subject} transition from {from} to {to}")]
    InvalidTransition {
        /// `plan` or the phase id.
        subject: String,
        /// Current state.
        from: State,
        /// Requested state.
        to: State,
    },
}

impl PlanError {
    /// Whether this error describes the shape of the plan rather than its state.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DuplicatePhase(_) | Self::InvalidReference { .. } | Self::CyclicDependency { .. }
        )
    }
}

fn render_cycle(cycle: &[PhaseId]) -> String {
    cycle
        .iter()
        .map(PhaseId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
