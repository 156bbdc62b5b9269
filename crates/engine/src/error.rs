//! Engine error types.

use gantry_core::{ActionKind, OperationId};
use gantry_plan::{PlanError, State};
use gantry_ports::PortsError;

/// Errors returned by [`PlanEngine`](crate::PlanEngine) entry points.
///
/// Handler failures never appear here: they are recorded on the phase and
/// reported through progress events.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The plan is malformed, or the state machine rejected a transition.
    #[error("invalid plan: {0}")]
    Validation(#[from] PlanError),

    /// Another process saved the plan first. Reload and decide whether to retry.
    #[error("plan {operation_id} was modified concurrently")]
    Conflict {
        /// The contested plan.
        operation_id: OperationId,
    },

    /// No plan is stored under the id.
    #[error("plan {operation_id} not found")]
    NotFound {
        /// The requested plan.
        operation_id: OperationId,
    },

    /// A phase names an action kind with no registered handler.
    #[error("no handler registered for action kind {0}")]
    UnknownAction(ActionKind),

    /// The requested operation does not apply to the plan's current state.
    #[error("cannot {operation} plan {operation_id} in state {state}")]
    InvalidState {
        /// The plan.
        operation_id: OperationId,
        /// Its current state.
        state: State,
        /// What the caller asked for.
        operation: &'static str,
    },

    /// The run was cancelled; the plan has been left `Failed`.
    #[error("plan {operation_id} cancelled")]
    Cancelled {
        /// The cancelled plan.
        operation_id: OperationId,
    },

    /// The persistence backend failed.
    #[error("persistence error: {0}")]
    Persistence(PortsError),

    /// A handler task could not be joined.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

impl EngineError {
    /// Classify a persistence failure for `operation_id`.
    #[must_use]
    pub fn persistence(operation_id: OperationId, err: PortsError) -> Self {
        match err {
            PortsError::NotFound { .. } => Self::NotFound { operation_id },
            PortsError::Conflict { .. } => Self::Conflict { operation_id },
            other => Self::Persistence(other),
        }
    }

    /// Returns `true` for concurrent-modification losses.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
