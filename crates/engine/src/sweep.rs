//! The scheduling loop shared by forward execution and the rollback sweep.
//!
//! The loop owns the [`Plan`]. Handler calls run as tasks in a [`JoinSet`] and
//! only report an outcome back; every mutation, save and event happens here, in
//! order, so the persisted plan never runs ahead of the events.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use gantry_core::PhaseId;
use gantry_plan::{AttemptKind, Phase, PhaseGraph, Plan, RollbackReport, State};
use gantry_runtime::{HandlerError, PhaseContext, PhaseHandler};
use gantry_telemetry::ProgressEvent;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::PlanEngine;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Rollback,
}

impl Direction {
    fn attempt_kind(self) -> AttemptKind {
        match self {
            Self::Forward => AttemptKind::Execute,
            Self::Rollback => AttemptKind::Rollback,
        }
    }
}

struct Outcome {
    phase_id: PhaseId,
    result: Result<(), HandlerError>,
    elapsed: Duration,
}

pub(crate) struct Sweep<'e> {
    engine: &'e PlanEngine,
    plan: Plan,
    graph: PhaseGraph,
    direction: Direction,
    cancel: CancellationToken,
    /// Parent of every handler token; cancelled on abort as well.
    tasks: CancellationToken,
    /// Phases with a task in flight, with the exclusivity key they hold.
    running: HashMap<PhaseId, Option<String>>,
    /// Rollback failures in this sweep only.
    rollback_failures: HashMap<PhaseId, u32>,
    residual: Vec<PhaseId>,
    join_set: JoinSet<Outcome>,
}

impl<'e> Sweep<'e> {
    pub(crate) fn new(
        engine: &'e PlanEngine,
        plan: Plan,
        direction: Direction,
        cancel: &CancellationToken,
    ) -> Result<Self, EngineError> {
        let graph = PhaseGraph::from_plan(&plan)?;
        Ok(Self {
            engine,
            plan,
            graph,
            direction,
            cancel: cancel.clone(),
            tasks: cancel.child_token(),
            running: HashMap::new(),
            rollback_failures: HashMap::new(),
            residual: Vec::new(),
            join_set: JoinSet::new(),
        })
    }

    /// Drive the sweep to its end and hand back the final plan.
    pub(crate) async fn run(mut self) -> Result<Plan, EngineError> {
        let result = self.drive().await;
        if result.is_err() {
            self.abort().await;
        }
        result.map(|()| self.plan)
    }

    async fn drive(&mut self) -> Result<(), EngineError> {
        self.prepare().await?;
        loop {
            if !self.cancel.is_cancelled() {
                for id in self.eligible() {
                    self.start(id, Duration::ZERO).await?;
                }
            }
            let Some(joined) = self.join_set.join_next().await else {
                break;
            };
            let outcome = joined.map_err(|err| EngineError::TaskPanicked(err.to_string()))?;
            self.settle(outcome).await?;
        }
        match self.direction {
            Direction::Forward => self.finish_forward().await,
            Direction::Rollback => self.finish_rollback().await,
        }
    }

    async fn prepare(&mut self) -> Result<(), EngineError> {
        let mut changed = false;
        for phase in &mut self.plan.phases {
            let closed = phase.close_interrupted_attempts();
            if closed > 0 {
                tracing::warn!(phase_id = %phase.id(), closed, "closing attempts interrupted by a previous run");
                changed = true;
            }
        }

        let mut started = None;
        match self.direction {
            Direction::Forward if self.plan.state == State::Unstarted => {
                started = Some(self.plan.transition(State::InProgress)?);
            }
            Direction::Forward => {}
            Direction::Rollback => changed |= self.plan.rollback.take().is_some(),
        }

        if changed || started.is_some() {
            self.persist().await?;
        }
        if let Some(from) = started {
            self.emit_plan(from, State::InProgress, "started");
        }
        tracing::info!(direction = ?self.direction, phases = self.plan.phases.len(), "sweep started");
        Ok(())
    }

    /// Phases that may be dispatched now, in plan order.
    fn eligible(&self) -> Vec<PhaseId> {
        let mut held: HashSet<&str> = self.running.values().filter_map(Option::as_deref).collect();
        let mut slots = self
            .engine
            .config
            .max_concurrency
            .map_or(usize::MAX, |max| max.max(1).saturating_sub(self.running.len()));
        let mut picked = Vec::new();
        for phase in &self.plan.phases {
            if slots == 0 {
                break;
            }
            if self.running.contains_key(phase.id()) || !self.is_ready(phase) {
                continue;
            }
            if let Some(key) = phase.exclusivity_key()
                && !held.insert(key)
            {
                continue;
            }
            picked.push(phase.id().clone());
            slots -= 1;
        }
        picked
    }

    fn is_ready(&self, phase: &Phase) -> bool {
        match self.direction {
            Direction::Forward => {
                matches!(phase.state, State::Unstarted | State::InProgress)
                    && self.plan.dependencies_completed(phase)
            }
            Direction::Rollback => {
                phase.state == State::Completed
                    && !self.residual.contains(phase.id())
                    && self
                        .graph
                        .dependents(phase.id())
                        .iter()
                        .all(|dependent| self.plan.phase_state(dependent) != Some(State::Completed))
            }
        }
    }

    /// Record a new attempt, persist it and spawn the handler call.
    async fn start(&mut self, id: PhaseId, delay: Duration) -> Result<(), EngineError> {
        let kind = self.direction.attempt_kind();
        let operation_id = self.plan.operation_id;
        let action = self.plan.phase_mut(&id)?.action().clone();
        let handler = self
            .engine
            .handlers
            .get(&action)
            .map_err(|_| EngineError::UnknownAction(action.clone()))?;

        let entered = self.direction == Direction::Forward
            && self.plan.phase_state(&id) == Some(State::Unstarted);
        if entered {
            self.plan.transition_phase(&id, State::InProgress)?;
        }
        let phase = self.plan.phase_mut(&id)?;
        let attempt = phase.begin_attempt(kind);
        let data = phase.data().clone();
        let key = phase.spec.exclusivity_key.clone();
        self.persist().await?;

        if entered {
            self.emit_phase(&id, State::Unstarted, State::InProgress, "dispatched");
        }
        tracing::info!(phase_id = %id, %action, attempt, ?kind, "dispatching phase");
        self.engine.metrics.counter("phase_attempts_total").inc();
        self.engine.metrics.gauge("phases_in_flight").inc();

        let ctx = PhaseContext::new(operation_id, id.clone(), attempt, self.tasks.child_token());
        self.running.insert(id, key);
        self.join_set
            .spawn(run_attempt(handler, ctx, data, kind, delay, self.tasks.clone()));
        Ok(())
    }

    async fn settle(&mut self, outcome: Outcome) -> Result<(), EngineError> {
        let Outcome {
            phase_id: id,
            result,
            elapsed,
        } = outcome;
        self.running.remove(&id);
        self.engine.metrics.gauge("phases_in_flight").dec();
        self.engine
            .metrics
            .histogram("phase_duration_seconds")
            .observe(elapsed.as_secs_f64());

        let err = match result {
            Ok(()) => return self.succeed(&id).await,
            Err(err) => err,
        };

        let kind = self.direction.attempt_kind();
        let message = err.to_string();
        let phase = self.plan.phase_mut(&id)?;
        phase.finish_attempt(kind, Some(message.clone()));
        let state = phase.state;
        let policy = phase
            .spec
            .retry
            .clone()
            .unwrap_or_else(|| self.engine.config.retry.clone());
        let failures = match self.direction {
            Direction::Forward => phase.failure_count(AttemptKind::Execute),
            Direction::Rollback => {
                let count = self.rollback_failures.entry(id.clone()).or_default();
                *count += 1;
                *count
            }
        };

        if err.is_retryable() && policy.allows_retry(failures) && !self.cancel.is_cancelled() {
            let delay = policy.backoff(failures);
            self.persist().await?;
            tracing::warn!(phase_id = %id, failures, delay_ms = delay.as_millis() as u64, error = %message, "phase attempt failed, retrying");
            self.emit_phase(
                &id,
                state,
                state,
                format!("attempt {failures} failed, retrying in {}ms: {message}", delay.as_millis()),
            );
            return self.start(id, delay).await;
        }

        match self.direction {
            Direction::Forward => {
                let from = self.plan.transition_phase(&id, State::Failed)?;
                self.persist().await?;
                tracing::error!(phase_id = %id, failures, error = %message, "phase failed");
                self.engine.metrics.counter("phases_failed_total").inc();
                self.emit_phase(&id, from, State::Failed, message);
            }
            Direction::Rollback
                if self.cancel.is_cancelled() && matches!(err, HandlerError::Cancelled) =>
            {
                // Still Completed: the next rollback call compensates it again.
                self.persist().await?;
                tracing::warn!(phase_id = %id, "phase rollback cancelled");
                self.emit_phase(&id, state, state, "rollback cancelled");
            }
            Direction::Rollback => {
                self.residual.push(id.clone());
                self.persist().await?;
                tracing::error!(phase_id = %id, failures, error = %message, "phase rollback failed");
                self.engine.metrics.counter("rollback_failures_total").inc();
                self.emit_phase(&id, state, state, format!("rollback failed: {message}"));
            }
        }
        Ok(())
    }

    async fn succeed(&mut self, id: &PhaseId) -> Result<(), EngineError> {
        let kind = self.direction.attempt_kind();
        self.plan.phase_mut(id)?.finish_attempt(kind, None);
        let (to, counter) = match self.direction {
            Direction::Forward => (State::Completed, "phases_completed_total"),
            Direction::Rollback => (State::RolledBack, "phases_rolled_back_total"),
        };
        let from = self.plan.transition_phase(id, to)?;
        self.persist().await?;
        tracing::info!(phase_id = %id, state = %to, "phase settled");
        self.engine.metrics.counter(counter).inc();
        self.emit_phase(id, from, to, "");
        Ok(())
    }

    async fn finish_forward(&mut self) -> Result<(), EngineError> {
        let operation_id = self.plan.operation_id;
        if self.plan.all_completed() {
            let from = self.plan.transition(State::Completed)?;
            self.persist().await?;
            self.retire().await?;
            tracing::info!("plan completed");
            self.emit_plan(from, State::Completed, "all phases completed");
            return Ok(());
        }

        let from = self.plan.transition(State::Failed)?;
        self.persist().await?;
        if self.cancel.is_cancelled() {
            tracing::warn!("plan cancelled");
            self.emit_settled(from, State::Failed, "cancelled");
            return Err(EngineError::Cancelled { operation_id });
        }
        let failed = self.plan.count(State::Failed);
        tracing::error!(failed, "plan failed");
        let message = format!("{failed} phase(s) failed");
        if self.engine.config.auto_rollback {
            self.emit_plan(from, State::Failed, message);
        } else {
            self.emit_settled(from, State::Failed, message);
        }
        Ok(())
    }

    async fn finish_rollback(&mut self) -> Result<(), EngineError> {
        let operation_id = self.plan.operation_id;
        let interrupted = self.cancel.is_cancelled() && self.plan.count(State::Completed) > 0;
        let blocked = self
            .plan
            .phases
            .iter()
            .filter(|p| p.state == State::Completed && !self.residual.contains(p.id()))
            .map(|p| p.id().clone())
            .collect();
        let report = RollbackReport {
            failed: self.residual.clone(),
            blocked,
            interrupted,
        };

        if interrupted {
            self.plan.rollback = Some(report);
            self.persist().await?;
            tracing::warn!("rollback interrupted");
            self.emit_settled(State::Failed, State::Failed, "rollback interrupted");
            return Err(EngineError::Cancelled { operation_id });
        }

        let message = if report.is_clean() {
            String::from("rollback complete")
        } else {
            tracing::warn!(failed = report.failed.len(), blocked = report.blocked.len(), "rollback left residual phases");
            format!(
                "rollback finished with {} failed and {} blocked phase(s)",
                report.failed.len(),
                report.blocked.len()
            )
        };
        self.plan.rollback = (!report.is_clean()).then_some(report);
        let from = self.plan.transition(State::RolledBack)?;
        self.persist().await?;
        self.retire().await?;
        self.emit_plan(from, State::RolledBack, message);
        Ok(())
    }

    /// Stop every task and wait for them without recording their outcomes.
    async fn abort(&mut self) {
        self.tasks.cancel();
        while let Some(joined) = self.join_set.join_next().await {
            self.engine.metrics.gauge("phases_in_flight").dec();
            if let Ok(outcome) = joined {
                tracing::debug!(phase_id = %outcome.phase_id, "discarding outcome of aborted sweep");
            }
        }
        self.running.clear();
    }

    async fn persist(&mut self) -> Result<(), EngineError> {
        let operation_id = self.plan.operation_id;
        self.engine
            .repo
            .save(&mut self.plan)
            .await
            .map(drop)
            .map_err(|err| EngineError::persistence(operation_id, err))
    }

    async fn retire(&mut self) -> Result<(), EngineError> {
        let operation_id = self.plan.operation_id;
        self.engine
            .repo
            .archive(operation_id)
            .await
            .map_err(|err| EngineError::persistence(operation_id, err))?;
        self.plan.archived = true;
        Ok(())
    }

    fn emit_phase(&self, id: &PhaseId, from: State, to: State, message: impl Into<String>) {
        self.engine.progress.emit(ProgressEvent::phase(
            self.plan.operation_id,
            id.clone(),
            from,
            to,
            message,
        ));
    }

    fn emit_plan(&self, from: State, to: State, message: impl Into<String>) {
        self.engine
            .progress
            .emit(ProgressEvent::plan(self.plan.operation_id, from, to, message));
    }

    /// Plan-level event after which this call drives the plan no further.
    fn emit_settled(&self, from: State, to: State, message: impl Into<String>) {
        self.engine
            .progress
            .emit(ProgressEvent::plan(self.plan.operation_id, from, to, message).settled());
    }
}

/// One handler call, preceded by the retry backoff.
async fn run_attempt(
    handler: Arc<dyn PhaseHandler>,
    ctx: PhaseContext,
    data: serde_json::Value,
    kind: AttemptKind,
    delay: Duration,
    cancel: CancellationToken,
) -> Outcome {
    let phase_id = ctx.phase_id.clone();
    if !delay.is_zero() {
        tokio::select! {
            () = cancel.cancelled() => {
                return Outcome { phase_id, result: Err(HandlerError::Cancelled), elapsed: Duration::ZERO };
            }
            () = tokio::time::sleep(delay) => {}
        }
    }

    let started = Instant::now();
    let call = async {
        match kind {
            AttemptKind::Execute => handler.execute(&ctx, &data).await,
            AttemptKind::Rollback => handler.rollback(&ctx, &data).await,
        }
    };
    let result = AssertUnwindSafe(call)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(HandlerError::fatal(panic_message(payload.as_ref()))));
    Outcome {
        phase_id,
        result,
        elapsed: started.elapsed(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("handler panicked: {detail}"),
        None => String::from("handler panicked"),
    }
}
