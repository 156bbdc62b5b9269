//! Progress events.

use chrono::{DateTime, Utc};
use gantry_core::{OperationId, PhaseId};
use gantry_plan::State;
use serde::{Deserialize, Serialize};

/// An immutable record of one state transition.
///
/// `phase_id` is `None` for plan-level transitions. A transition where
/// `from_state == to_state` carries a message only (e.g. a retry notice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Operation the transition belongs to.
    pub operation_id: OperationId,
    /// Phase that moved, or `None` for the plan itself.
    pub phase_id: Option<PhaseId>,
    /// State before the transition.
    pub from_state: State,
    /// State after the transition.
    pub to_state: State,
    /// When the transition was persisted.
    pub timestamp: DateTime<Utc>,
    /// Human-readable detail.
    pub message: String,
    /// Last event of the run that emitted it, even though the plan may
    /// not be terminal (e.g. it stopped at `Failed` without rolling back).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub settled: bool,
}

impl ProgressEvent {
    /// A plan-level transition.
    #[must_use]
    pub fn plan(operation_id: OperationId, from: State, to: State, message: impl Into<String>) -> Self {
        Self {
            operation_id,
            phase_id: None,
            from_state: from,
            to_state: to,
            timestamp: Utc::now(),
            message: message.into(),
            settled: false,
        }
    }

    /// A phase-level transition.
    #[must_use]
    pub fn phase(
        operation_id: OperationId,
        phase_id: PhaseId,
        from: State,
        to: State,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation_id,
            phase_id: Some(phase_id),
            from_state: from,
            to_state: to,
            timestamp: Utc::now(),
            message: message.into(),
            settled: false,
        }
    }

    /// Returns `true` for plan-level events.
    #[must_use]
    pub fn is_plan_level(&self) -> bool {
        self.phase_id.is_none()
    }

    /// Mark this as the last event of its run.
    #[must_use]
    pub fn settled(mut self) -> Self {
        self.settled = true;
        self
    }

    /// Returns `true` if no event for this operation follows: the plan moved
    /// into a terminal state, or the run that drove it stopped.
    #[must_use]
    pub fn ends_operation(&self) -> bool {
        self.is_plan_level()
            && (self.settled || (self.to_state.is_terminal() && self.from_state != self.to_state))
    }
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subject = self.phase_id.as_ref().map_or("plan", PhaseId::as_str);
        write!(
            f,
            "{} {subject}: {} -> {}",
            self.timestamp.format("%H:%M:%S"),
            self.from_state,
            self.to_state
        )?;
        if !self.message.is_empty() {
            write!(f, " ({})", self.message)?;
        }
        Ok(())
    }
}
