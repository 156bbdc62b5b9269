//! The plan engine and its entry points.

use std::sync::Arc;

use gantry_core::OperationId;
use gantry_plan::{Plan, State, validate};
use gantry_ports::PlanRepo;
use gantry_runtime::HandlerRegistry;
use gantry_telemetry::{MetricsRegistry, ProgressBus, ProgressEvent, ProgressStream};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::snapshot::PlanSnapshot;
use crate::sweep::{Direction, Sweep};

/// Executes, resumes and rolls back persisted plans.
///
/// The engine holds no per-plan state between calls. Everything it needs to
/// continue a plan is read back from the [`PlanRepo`], so any engine instance
/// can pick up a plan another one left behind. Two instances driving the same
/// plan at once are separated by the repository's compare-and-swap: the loser
/// gets [`EngineError::Conflict`].
///
/// # Examples
///
/// ```no_run
/// # async fn demo(repo: std::sync::Arc<dyn gantry_ports::PlanRepo>, plan: gantry_plan::Plan)
/// # -> Result<(), gantry_engine::EngineError> {
/// use std::sync::Arc;
///
/// use gantry_engine::PlanEngine;
/// use gantry_runtime::HandlerRegistry;
/// use gantry_runtime::handlers::NoopHandler;
/// use tokio_util::sync::CancellationToken;
///
/// let handlers = HandlerRegistry::new();
/// handlers.register("noop".parse().unwrap(), Arc::new(NoopHandler));
/// let engine = PlanEngine::new(repo, Arc::new(handlers));
///
/// engine.submit(&plan).await?;
/// let snapshot = engine.execute(plan.operation_id, &CancellationToken::new()).await?;
/// println!("{} is {}", snapshot.operation_id, snapshot.state);
/// # Ok(())
/// # }
/// ```
pub struct PlanEngine {
    pub(crate) repo: Arc<dyn PlanRepo>,
    pub(crate) handlers: Arc<HandlerRegistry>,
    pub(crate) progress: Arc<ProgressBus>,
    pub(crate) metrics: MetricsRegistry,
    pub(crate) config: EngineConfig,
}

impl PlanEngine {
    /// Create an engine with default configuration, its own progress bus and metrics.
    pub fn new(repo: Arc<dyn PlanRepo>, handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            repo,
            handlers,
            progress: Arc::new(ProgressBus::default()),
            metrics: MetricsRegistry::new(),
            config: EngineConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish progress on a shared bus.
    pub fn with_progress(mut self, progress: Arc<ProgressBus>) -> Self {
        self.progress = progress;
        self
    }

    /// Record metrics into a shared registry.
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = metrics;
        self
    }

    /// The progress bus events are published on.
    pub fn progress(&self) -> &Arc<ProgressBus> {
        &self.progress
    }

    /// The metrics registry.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a freshly built plan and persist it for execution.
    pub async fn submit(&self, plan: &Plan) -> Result<(), EngineError> {
        self.check(plan)?;
        self.repo
            .create(plan)
            .await
            .map_err(|err| EngineError::persistence(plan.operation_id, err))?;
        tracing::info!(operation_id = %plan.operation_id, kind = %plan.kind, phases = plan.phases.len(), "plan submitted");
        Ok(())
    }

    /// Run a persisted plan until it settles.
    ///
    /// `Unstarted` and `InProgress` plans are driven forward; if that ends
    /// `Failed` and auto-rollback is enabled, the rollback sweep follows. A
    /// `Failed` plan goes straight to rollback. Terminal plans are returned
    /// unchanged. Handler failures are not errors: inspect the returned
    /// snapshot's state.
    pub async fn execute(
        &self,
        operation_id: OperationId,
        cancel: &CancellationToken,
    ) -> Result<PlanSnapshot, EngineError> {
        let span = tracing::info_span!("plan", operation_id = %operation_id);
        async {
            let plan = self.load(operation_id).await?;
            self.check(&plan)?;
            let plan = match plan.state {
                State::Unstarted | State::InProgress => {
                    let plan = Sweep::new(self, plan, Direction::Forward, cancel)?.run().await?;
                    if plan.state == State::Failed && self.config.auto_rollback {
                        Sweep::new(self, plan, Direction::Rollback, cancel)?.run().await?
                    } else {
                        plan
                    }
                }
                State::Failed if self.config.auto_rollback => {
                    Sweep::new(self, plan, Direction::Rollback, cancel)?.run().await?
                }
                State::Failed | State::Completed | State::RolledBack => plan,
            };
            Ok::<_, EngineError>(PlanSnapshot::from(&plan))
        }
        .instrument(span)
        .await
    }

    /// Continue a plan persisted by an earlier, possibly crashed, run.
    ///
    /// Identical to [`execute`](Self::execute): the persisted phase states are
    /// the checkpoint. Phases found `InProgress` are executed again.
    pub async fn resume(
        &self,
        operation_id: OperationId,
        cancel: &CancellationToken,
    ) -> Result<PlanSnapshot, EngineError> {
        self.execute(operation_id, cancel).await
    }

    /// Compensate every completed phase of a plan, dependents first.
    ///
    /// Accepts `Failed` plans and `InProgress` plans abandoned by a dead
    /// process; the latter are first marked `Failed`. A plan that already
    /// rolled back is returned unchanged.
    pub async fn rollback(
        &self,
        operation_id: OperationId,
        cancel: &CancellationToken,
    ) -> Result<PlanSnapshot, EngineError> {
        let span = tracing::info_span!("plan", operation_id = %operation_id);
        async {
            let mut plan = self.load(operation_id).await?;
            self.check(&plan)?;
            match plan.state {
                State::RolledBack => return Ok(PlanSnapshot::from(&plan)),
                State::Unstarted | State::Completed => {
                    return Err(EngineError::InvalidState {
                        operation_id,
                        state: plan.state,
                        operation: "roll back",
                    });
                }
                State::InProgress => self.abandon(&mut plan).await?,
                State::Failed => {}
            }
            let plan = Sweep::new(self, plan, Direction::Rollback, cancel)?.run().await?;
            Ok::<_, EngineError>(PlanSnapshot::from(&plan))
        }
        .instrument(span)
        .await
    }

    /// Current status of a plan, live or archived.
    pub async fn status(&self, operation_id: OperationId) -> Result<PlanSnapshot, EngineError> {
        let plan = self.load(operation_id).await?;
        Ok(PlanSnapshot::from(&plan))
    }

    /// Follow a plan's progress.
    ///
    /// The stream ends once the plan reaches a terminal state, or when the run
    /// driving it stops at `Failed` without finishing a rollback. For a plan
    /// that is already terminal it ends immediately.
    pub async fn watch(&self, operation_id: OperationId) -> Result<ProgressStream, EngineError> {
        let stream = self.progress.subscribe(operation_id);
        let plan = self.load(operation_id).await?;
        if plan.state.is_terminal() {
            return Ok(ProgressStream::finished());
        }
        Ok(stream)
    }

    /// Ids of plans that have not been archived.
    pub async fn list_active(&self) -> Result<Vec<OperationId>, EngineError> {
        self.repo.list_active().await.map_err(EngineError::Persistence)
    }

    async fn load(&self, operation_id: OperationId) -> Result<Plan, EngineError> {
        self.repo
            .load(operation_id)
            .await
            .map_err(|err| EngineError::persistence(operation_id, err))
    }

    fn check(&self, plan: &Plan) -> Result<(), EngineError> {
        validate(plan)?;
        if let Some(phase) = plan.phases.iter().find(|p| !self.handlers.contains(p.action())) {
            return Err(EngineError::UnknownAction(phase.action().clone()));
        }
        Ok(())
    }

    /// Mark an orphaned `InProgress` plan and its in-flight phases `Failed`.
    async fn abandon(&self, plan: &mut Plan) -> Result<(), EngineError> {
        let operation_id = plan.operation_id;
        let orphans: Vec<_> = plan
            .phases
            .iter()
            .filter(|p| p.state == State::InProgress)
            .map(|p| p.id().clone())
            .collect();
        for id in &orphans {
            let phase = plan.phase_mut(id)?;
            phase.close_interrupted_attempts();
            phase.last_error = Some(String::from("interrupted before completion"));
            plan.transition_phase(id, State::Failed)?;
        }
        let from = plan.transition(State::Failed)?;
        self.repo
            .save(plan)
            .await
            .map_err(|err| EngineError::persistence(operation_id, err))?;
        tracing::warn!(orphans = orphans.len(), "abandoning in-progress plan for rollback");
        for id in orphans {
            self.progress.emit(ProgressEvent::phase(
                operation_id,
                id,
                State::InProgress,
                State::Failed,
                "interrupted before completion",
            ));
        }
        self.progress.emit(ProgressEvent::plan(
            operation_id,
            from,
            State::Failed,
            "rollback requested",
        ));
        Ok(())
    }
}

impl std::fmt::Debug for PlanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanEngine")
            .field("handlers", &self.handlers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
