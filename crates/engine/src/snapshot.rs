//! Read-only status views.

use chrono::{DateTime, Utc};
use gantry_core::{ActionKind, OperationId, PhaseId};
use gantry_plan::{AttemptKind, OperationKind, Phase, Plan, RollbackReport, State};
use serde::Serialize;

/// Number of phases in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    /// Not yet dispatched.
    pub unstarted: usize,
    /// Dispatched, not yet settled.
    pub in_progress: usize,
    /// Finished successfully.
    pub completed: usize,
    /// Failed after exhausting retries.
    pub failed: usize,
    /// Compensated by a rollback sweep.
    pub rolled_back: usize,
}

impl StateCounts {
    /// Total number of phases.
    #[must_use]
    pub fn total(&self) -> usize {
        self.unstarted + self.in_progress + self.completed + self.failed + self.rolled_back
    }

    fn record(&mut self, state: State) {
        match state {
            State::Unstarted => self.unstarted += 1,
            State::InProgress => self.in_progress += 1,
            State::Completed => self.completed += 1,
            State::Failed => self.failed += 1,
            State::RolledBack => self.rolled_back += 1,
        }
    }
}

/// Status of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseSnapshot {
    /// Phase id.
    pub id: PhaseId,
    /// Handler kind.
    pub action: ActionKind,
    /// Current state.
    pub state: State,
    /// Number of `execute` calls so far.
    pub attempts: u32,
    /// Number of `rollback` calls so far.
    pub rollback_attempts: u32,
    /// Latest execute error.
    pub last_error: Option<String>,
    /// Latest rollback error.
    pub rollback_error: Option<String>,
    /// When the phase was first dispatched.
    pub started_at: Option<DateTime<Utc>>,
    /// When the phase last settled.
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&Phase> for PhaseSnapshot {
    fn from(phase: &Phase) -> Self {
        Self {
            id: phase.id().clone(),
            action: phase.action().clone(),
            state: phase.state,
            attempts: phase.attempt_count(AttemptKind::Execute),
            rollback_attempts: phase.attempt_count(AttemptKind::Rollback),
            last_error: phase.last_error.clone(),
            rollback_error: phase.rollback_error.clone(),
            started_at: phase.started_at,
            finished_at: phase.finished_at,
        }
    }
}

/// Status of a plan as last persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSnapshot {
    /// Operation id.
    pub operation_id: OperationId,
    /// Procedure kind.
    pub kind: OperationKind,
    /// Aggregate state.
    pub state: State,
    /// Persisted version.
    pub version: u64,
    /// Whether the plan has been retired to the archive.
    pub archived: bool,
    /// Phases in plan order.
    pub phases: Vec<PhaseSnapshot>,
    /// Phases per state.
    pub counts: StateCounts,
    /// Residual failures of the last rollback sweep.
    pub rollback: Option<RollbackReport>,
    /// Most recent error reported by any phase, prefixed with its id.
    pub latest_message: Option<String>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

impl PlanSnapshot {
    /// Share of phases that have settled, from 0 to 100. An empty plan is 100.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        let total = self.counts.total();
        if total == 0 {
            return 100;
        }
        let settled = self.counts.completed + self.counts.failed + self.counts.rolled_back;
        ((settled * 100) / total) as u8
    }

    /// Returns `true` once the plan can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Look up a phase.
    #[must_use]
    pub fn phase(&self, id: &PhaseId) -> Option<&PhaseSnapshot> {
        self.phases.iter().find(|p| &p.id == id)
    }
}

impl From<&Plan> for PlanSnapshot {
    fn from(plan: &Plan) -> Self {
        let mut counts = StateCounts::default();
        for phase in &plan.phases {
            counts.record(phase.state);
        }
        Self {
            operation_id: plan.operation_id,
            kind: plan.kind,
            state: plan.state,
            version: plan.version,
            archived: plan.archived,
            phases: plan.phases.iter().map(PhaseSnapshot::from).collect(),
            counts,
            rollback: plan.rollback.clone(),
            latest_message: latest_message(plan),
            updated_at: plan.updated_at,
        }
    }
}

fn latest_message(plan: &Plan) -> Option<String> {
    plan.phases
        .iter()
        .flat_map(|phase| {
            phase.attempts.iter().filter_map(move |attempt| {
                let error = attempt.error.as_ref()?;
                let finished = attempt.finished_at?;
                Some((finished, phase.id(), error))
            })
        })
        .max_by_key(|(finished, ..)| *finished)
        .map(|(_, id, error)| format!("{id}: {error}"))
}
