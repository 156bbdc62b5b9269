//! The plan aggregate.

use chrono::{DateTime, Utc};
use gantry_core::{OperationId, PhaseId};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::phase::Phase;
use crate::state::State;
use crate::transition::{validate_phase_transition, validate_plan_transition};

/// The cluster procedure a plan carries out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Initial cluster installation.
    Install,
    /// Adding nodes to a running cluster.
    Expand,
    /// Upgrading cluster software.
    Upgrade,
    /// Tearing the cluster down.
    Uninstall,
    /// Anything else driven through the plan runner.
    #[default]
    Other,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Expand => write!(f, "expand"),
            Self::Upgrade => write!(f, "upgrade"),
            Self::Uninstall => write!(f, "uninstall"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Outcome of a rollback sweep that did not compensate everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    /// Phases whose rollback handler failed after exhausting retries.
    #[serde(default)]
    pub failed: Vec<PhaseId>,
    /// Completed phases left in place because a dependent could not be rolled back.
    #[serde(default)]
    pub blocked: Vec<PhaseId>,
    /// The sweep stopped early (cancellation or a lost write).
    #[serde(default)]
    pub interrupted: bool,
}

impl RollbackReport {
    /// Returns `true` if nothing was left behind.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty() && !self.interrupted
    }
}

/// The persisted description and live state of one operation.
///
/// `version` is owned by the persistence layer: it is bumped on every
/// successful save and checked on the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Identifies the whole procedure.
    pub operation_id: OperationId,
    /// What kind of procedure this is.
    #[serde(default)]
    pub kind: OperationKind,
    /// Aggregate state.
    #[serde(default)]
    pub state: State,
    /// Optimistic-concurrency counter.
    #[serde(default)]
    pub version: u64,
    /// Phases in insertion order; order only breaks ties.
    pub phases: Vec<Phase>,
    /// When the plan was built.
    pub created_at: DateTime<Utc>,
    /// When the plan or any phase last changed state.
    pub updated_at: DateTime<Utc>,
    /// Residual failures of the last rollback sweep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackReport>,
    /// Set once the plan has been retired to the archive.
    #[serde(default)]
    pub archived: bool,
}

impl Plan {
    /// Create an `Unstarted` plan at version 0. Callers go through
    /// [`PlanBuilder`](crate::PlanBuilder), which validates first.
    #[must_use]
    pub(crate) fn new(operation_id: OperationId, kind: OperationKind, phases: Vec<Phase>) -> Self {
        let now = Utc::now();
        Self {
            operation_id,
            kind,
            state: State::Unstarted,
            version: 0,
            phases,
            created_at: now,
            updated_at: now,
            rollback: None,
            archived: false,
        }
    }

    /// Look up a phase.
    #[must_use]
    pub fn phase(&self, id: &PhaseId) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id() == id)
    }

    /// Look up a phase for mutation.
    pub fn phase_mut(&mut self, id: &PhaseId) -> Result<&mut Phase, PlanError> {
        self.phases
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or_else(|| PlanError::UnknownPhase(id.clone()))
    }

    /// State of a phase, if present.
    #[must_use]
    pub fn phase_state(&self, id: &PhaseId) -> Option<State> {
        self.phase(id).map(|p| p.state)
    }

    /// Move the plan to `to`, returning the previous state.
    pub fn transition(&mut self, to: State) -> Result<State, PlanError> {
        let from = self.state;
        validate_plan_transition(from, to)?;
        self.state = to;
        self.updated_at = Utc::now();
        Ok(from)
    }

    /// Move a phase to `to`, returning its previous state.
    pub fn transition_phase(&mut self, id: &PhaseId, to: State) -> Result<State, PlanError> {
        let now = Utc::now();
        let phase = self.phase_mut(id)?;
        let from = phase.state;
        validate_phase_transition(id.as_str(), from, to)?;
        phase.state = to;
        if to == State::InProgress {
            phase.started_at.get_or_insert(now);
        } else {
            phase.finished_at = Some(now);
        }
        self.updated_at = now;
        Ok(from)
    }

    /// Number of phases in `state`.
    #[must_use]
    pub fn count(&self, state: State) -> usize {
        self.phases.iter().filter(|p| p.state == state).count()
    }

    /// Returns `true` if every phase is `Completed`.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.phases.iter().all(|p| p.state == State::Completed)
    }

    /// Returns `true` if every dependency of `phase` is `Completed`.
    #[must_use]
    pub fn dependencies_completed(&self, phase: &Phase) -> bool {
        phase
            .dependencies()
            .iter()
            .all(|dep| self.phase_state(dep) == Some(State::Completed))
    }
}
