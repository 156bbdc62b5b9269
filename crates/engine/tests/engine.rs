//! End-to-end tests for the plan engine.
//!
//! These exercise the full stack: plan → engine → handler registry → scripted
//! handlers, persisting through a `KvPlanRepo` over the in-memory backend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use gantry_core::{ActionKind, OperationId, PhaseId};
use gantry_engine::{EngineConfig, EngineError, PlanEngine};
use gantry_plan::{AttemptKind, PhaseSpec, Plan, PlanBuilder, PlanError, RetryConfig, State};
use gantry_ports::PlanRepo;
use gantry_runtime::{HandlerError, HandlerRegistry, PhaseContext, PhaseHandler};
use gantry_storage::{KvPlanRepo, MemoryBackend};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Test handlers
// ---------------------------------------------------------------------------

/// Records every call and fails on request.
#[derive(Default)]
struct Scripted {
    calls: Mutex<Vec<(AttemptKind, String)>>,
    execute_failures: Mutex<HashMap<String, u32>>,
    rollback_failures: Mutex<HashMap<String, u32>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Scripted {
    /// Fail `execute` of `phase` the next `times` calls; `u32::MAX` fails forever.
    fn fail_execute(self, phase: &str, times: u32) -> Self {
        self.execute_failures.lock().insert(phase.to_owned(), times);
        self
    }

    fn fail_rollback(self, phase: &str, times: u32) -> Self {
        self.rollback_failures.lock().insert(phase.to_owned(), times);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self, kind: AttemptKind) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, phase)| phase.clone())
            .collect()
    }

    fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn reset_max_active(&self) {
        self.max_active.store(0, Ordering::SeqCst);
    }

    async fn call(&self, kind: AttemptKind, ctx: &PhaseContext) -> Result<(), HandlerError> {
        self.calls.lock().push((kind, ctx.phase_id.to_string()));
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let failures = match kind {
            AttemptKind::Execute => &self.execute_failures,
            AttemptKind::Rollback => &self.rollback_failures,
        };
        let mut failures = failures.lock();
        match failures.get_mut(ctx.phase_id.as_str()) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                Err(HandlerError::transient(format!("{} refused", ctx.phase_id)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PhaseHandler for Scripted {
    async fn execute(&self, ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        self.call(AttemptKind::Execute, ctx).await
    }

    async fn rollback(&self, ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        self.call(AttemptKind::Rollback, ctx).await
    }
}

/// Announces that it started, then waits for cancellation.
#[derive(Default)]
struct Blocking {
    started: Notify,
}

#[async_trait]
impl PhaseHandler for Blocking {
    async fn execute(&self, ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        self.started.notify_one();
        ctx.cancelled().await;
        Err(HandlerError::Cancelled)
    }

    async fn rollback(&self, _ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Executes at once; its first rollback waits for cancellation.
#[derive(Default)]
struct StallingRollback {
    started: Notify,
    stalled: AtomicBool,
}

#[async_trait]
impl PhaseHandler for StallingRollback {
    async fn execute(&self, _ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn rollback(&self, ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        if self.stalled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.started.notify_one();
        ctx.cancelled().await;
        Err(HandlerError::Cancelled)
    }
}

/// Saves the plan behind the engine's back, as a second process would.
struct Meddler {
    repo: Arc<dyn PlanRepo>,
}

#[async_trait]
impl PhaseHandler for Meddler {
    async fn execute(&self, ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        let mut plan = self.repo.load(ctx.operation_id).await?;
        self.repo.save(&mut plan).await?;
        Ok(())
    }

    async fn rollback(&self, _ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        Ok(())
    }
}

struct Panicking;

#[async_trait]
impl PhaseHandler for Panicking {
    async fn execute(&self, _ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        panic!("boom");
    }

    async fn rollback(&self, _ctx: &PhaseContext, _data: &serde_json::Value) -> Result<(), HandlerError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pid(raw: &str) -> PhaseId {
    raw.parse().unwrap()
}

fn kind(raw: &str) -> ActionKind {
    raw.parse().unwrap()
}

fn step(id: &str) -> PhaseSpec {
    PhaseSpec::new(pid(id), kind("step"))
}

struct Harness {
    engine: PlanEngine,
    repo: Arc<dyn PlanRepo>,
    handlers: Arc<HandlerRegistry>,
    scripted: Arc<Scripted>,
}

fn harness(scripted: Scripted, config: EngineConfig) -> Harness {
    let repo: Arc<dyn PlanRepo> = Arc::new(KvPlanRepo::new(MemoryBackend::new()));
    let scripted = Arc::new(scripted);
    let handlers = Arc::new(HandlerRegistry::new());
    handlers.register(kind("step"), scripted.clone());
    let engine = PlanEngine::new(Arc::clone(&repo), Arc::clone(&handlers)).with_config(config);
    Harness {
        engine,
        repo,
        handlers,
        scripted,
    }
}

fn fast_retry(max_attempts: u32) -> EngineConfig {
    EngineConfig::default().with_retry(RetryConfig::fixed(max_attempts, 10))
}

fn plan(specs: impl IntoIterator<Item = PhaseSpec>) -> Plan {
    PlanBuilder::new(OperationId::v4()).phases(specs).build().unwrap()
}

impl Harness {
    async fn run(&self, plan: &Plan) -> Result<gantry_engine::PlanSnapshot, EngineError> {
        self.engine.submit(plan).await?;
        self.engine
            .execute(plan.operation_id, &CancellationToken::new())
            .await
    }
}

// ---------------------------------------------------------------------------
// Forward execution
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn chain_with_transient_failures_completes() {
    let h = harness(Scripted::default().fail_execute("/b", 2), fast_retry(3));
    let plan = plan([
        step("/a"),
        step("/b").depends_on(pid("/a")),
        step("/c").depends_on(pid("/b")),
    ]);

    let snapshot = h.run(&plan).await.unwrap();

    assert_eq!(snapshot.state, State::Completed);
    assert_eq!(snapshot.counts.completed, 3);
    assert_eq!(snapshot.phase(&pid("/b")).unwrap().attempts, 3);
    assert_eq!(
        h.scripted.calls(AttemptKind::Execute),
        vec!["/a", "/b", "/b", "/b", "/c"]
    );
    assert!(h.scripted.calls(AttemptKind::Rollback).is_empty());
    assert_eq!(h.engine.metrics().counter("phase_attempts_total").get(), 5);
    assert_eq!(h.engine.metrics().counter("phases_completed_total").get(), 3);
    assert_eq!(h.engine.metrics().gauge("phases_in_flight").get(), 0);

    let stored = h.engine.status(plan.operation_id).await.unwrap();
    assert!(stored.archived);
    assert_eq!(stored.state, State::Completed);
    assert!(h.repo.list_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_plan_completes_immediately() {
    let h = harness(Scripted::default(), EngineConfig::default());
    let snapshot = h.run(&plan([])).await.unwrap();
    assert_eq!(snapshot.state, State::Completed);
    assert_eq!(snapshot.progress_percent(), 100);
}

#[tokio::test(start_paused = true)]
async fn failed_phase_halts_dependents_then_rolls_back() {
    let h = harness(
        Scripted::default().fail_execute("/c", u32::MAX),
        fast_retry(2),
    );
    let plan = plan([
        step("/a"),
        step("/b").depends_on(pid("/a")),
        step("/c").depends_on(pid("/b")),
        step("/d").depends_on(pid("/c")),
        step("/e"),
    ]);

    let snapshot = h.run(&plan).await.unwrap();

    assert_eq!(snapshot.state, State::RolledBack);
    assert_eq!(snapshot.rollback, None);
    let state = |id: &str| snapshot.phase(&pid(id)).unwrap().state;
    assert_eq!(state("/a"), State::RolledBack);
    assert_eq!(state("/b"), State::RolledBack);
    assert_eq!(state("/c"), State::Failed);
    assert_eq!(state("/d"), State::Unstarted);
    assert_eq!(state("/e"), State::RolledBack);
    assert_eq!(snapshot.phase(&pid("/c")).unwrap().attempts, 2);
    let last_error = snapshot.phase(&pid("/c")).unwrap().last_error.clone().unwrap();
    assert!(last_error.contains("/c refused"), "{last_error}");

    let rolled: Vec<_> = h.scripted.calls(AttemptKind::Rollback);
    let set: HashSet<_> = rolled.iter().map(String::as_str).collect();
    assert_eq!(set, HashSet::from(["/a", "/b", "/e"]));
    assert_eq!(rolled.len(), 3);
    let position = |id: &str| rolled.iter().position(|p| p == id).unwrap();
    assert!(position("/b") < position("/a"));
    assert!(!h.scripted.calls(AttemptKind::Execute).contains(&"/d".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn manual_rollback_without_auto_rollback() {
    let h = harness(
        Scripted::default().fail_execute("/b", u32::MAX),
        EngineConfig::default()
            .with_retry(RetryConfig::none())
            .with_auto_rollback(false),
    );
    let plan = plan([step("/a"), step("/b").depends_on(pid("/a"))]);

    let snapshot = h.run(&plan).await.unwrap();
    assert_eq!(snapshot.state, State::Failed);
    assert!(h.scripted.calls(AttemptKind::Rollback).is_empty());

    // Executing a failed plan again does not re-run anything.
    let again = h
        .engine
        .execute(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.state, State::Failed);
    assert_eq!(h.scripted.calls(AttemptKind::Execute), vec!["/a", "/b"]);

    let rolled = h
        .engine
        .rollback(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(rolled.state, State::RolledBack);
    assert_eq!(h.scripted.calls(AttemptKind::Rollback), vec!["/a"]);

    // Rolling back twice is a no-op.
    let twice = h
        .engine
        .rollback(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(twice.state, State::RolledBack);
    assert_eq!(h.scripted.calls(AttemptKind::Rollback).len(), 1);
}

#[tokio::test]
async fn rollback_of_completed_plan_is_invalid() {
    let h = harness(Scripted::default(), EngineConfig::default());
    let plan = plan([step("/a")]);
    h.run(&plan).await.unwrap();

    let err = h
        .engine
        .rollback(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidState { state: State::Completed, .. }
    ));
}

#[tokio::test]
async fn panicking_handler_fails_without_retry() {
    let h = harness(Scripted::default(), fast_retry(3).with_auto_rollback(false));
    h.handlers.register(kind("panic"), Arc::new(Panicking));
    let plan = plan([PhaseSpec::new(pid("/p"), kind("panic"))]);

    let snapshot = h.run(&plan).await.unwrap();

    assert_eq!(snapshot.state, State::Failed);
    let phase = snapshot.phase(&pid("/p")).unwrap();
    assert_eq!(phase.state, State::Failed);
    assert_eq!(phase.attempts, 1);
    assert!(phase.last_error.as_deref().unwrap().contains("handler panicked: boom"));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[rstest]
#[case::shared_key(Some("node-1"), Some("node-1"), 1)]
#[case::distinct_keys(Some("node-1"), Some("node-2"), 2)]
#[case::no_keys(None, None, 2)]
#[tokio::test(start_paused = true)]
async fn exclusivity_keys_serialize_phases(
    #[case] first: Option<&str>,
    #[case] second: Option<&str>,
    #[case] expected: usize,
) {
    let h = harness(
        Scripted::default().with_delay(Duration::from_millis(50)),
        EngineConfig::default(),
    );
    let with_key = |spec: PhaseSpec, key: Option<&str>| match key {
        Some(key) => spec.exclusive_on(key),
        None => spec,
    };
    let plan = plan([with_key(step("/a"), first), with_key(step("/b"), second)]);

    let snapshot = h.run(&plan).await.unwrap();

    assert_eq!(snapshot.state, State::Completed);
    assert_eq!(h.scripted.max_active(), expected);
}

#[rstest]
#[case::shared_key(Some("node-1"), Some("node-1"), 1)]
#[case::distinct_keys(Some("node-1"), Some("node-2"), 2)]
#[tokio::test(start_paused = true)]
async fn exclusivity_keys_serialize_rollback(
    #[case] first: Option<&str>,
    #[case] second: Option<&str>,
    #[case] expected: usize,
) {
    let h = harness(
        Scripted::default()
            .with_delay(Duration::from_millis(50))
            .fail_execute("/c", u32::MAX),
        EngineConfig::default()
            .with_retry(RetryConfig::none())
            .with_auto_rollback(false),
    );
    let with_key = |spec: PhaseSpec, key: Option<&str>| match key {
        Some(key) => spec.exclusive_on(key),
        None => spec,
    };
    let plan = plan([
        with_key(step("/a"), first),
        with_key(step("/b"), second),
        step("/c"),
    ]);
    assert_eq!(h.run(&plan).await.unwrap().state, State::Failed);
    h.scripted.reset_max_active();

    let snapshot = h
        .engine
        .rollback(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.state, State::RolledBack);
    let rolled: HashSet<_> = h.scripted.calls(AttemptKind::Rollback).into_iter().collect();
    assert_eq!(rolled, HashSet::from(["/a".to_owned(), "/b".to_owned()]));
    assert_eq!(h.scripted.max_active(), expected);
}

#[tokio::test(start_paused = true)]
async fn concurrency_limit_bounds_fan_out() {
    let h = harness(
        Scripted::default().with_delay(Duration::from_millis(50)),
        EngineConfig::default().with_max_concurrency(2),
    );
    let plan = plan([step("/a"), step("/b"), step("/c"), step("/d")]);

    let snapshot = h.run(&plan).await.unwrap();

    assert_eq!(snapshot.state, State::Completed);
    assert_eq!(h.scripted.max_active(), 2);
}

// ---------------------------------------------------------------------------
// Resume, cancellation, conflicts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resume_skips_completed_and_reruns_in_progress() {
    let h = harness(Scripted::default(), fast_retry(1));
    let plan = plan([
        step("/a"),
        step("/b").depends_on(pid("/a")),
        step("/c").depends_on(pid("/b")),
    ]);
    h.engine.submit(&plan).await.unwrap();

    // Leave the plan as a process that died inside /b's handler would.
    let mut stored = h.repo.load(plan.operation_id).await.unwrap();
    stored.transition(State::InProgress).unwrap();
    stored.transition_phase(&pid("/a"), State::InProgress).unwrap();
    stored.phase_mut(&pid("/a")).unwrap().begin_attempt(AttemptKind::Execute);
    stored.phase_mut(&pid("/a")).unwrap().finish_attempt(AttemptKind::Execute, None);
    stored.transition_phase(&pid("/a"), State::Completed).unwrap();
    stored.transition_phase(&pid("/b"), State::InProgress).unwrap();
    stored.phase_mut(&pid("/b")).unwrap().begin_attempt(AttemptKind::Execute);
    h.repo.save(&mut stored).await.unwrap();

    // A budget of one still allows the re-run: the interrupted call does not count.
    let snapshot = h
        .engine
        .resume(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.state, State::Completed);
    assert_eq!(h.scripted.calls(AttemptKind::Execute), vec!["/b", "/c"]);
    assert_eq!(snapshot.phase(&pid("/a")).unwrap().attempts, 1);
    assert_eq!(snapshot.phase(&pid("/b")).unwrap().attempts, 2);
}

#[tokio::test]
async fn cancellation_marks_plan_failed_without_rollback() {
    let h = harness(Scripted::default(), EngineConfig::default());
    let blocking = Arc::new(Blocking::default());
    h.handlers.register(kind("block"), blocking.clone());
    let plan = plan([
        step("/a"),
        PhaseSpec::new(pid("/wait"), kind("block")),
        step("/after").depends_on(pid("/wait")),
    ]);
    h.engine.submit(&plan).await.unwrap();

    let cancel = CancellationToken::new();
    let (result, ()) = tokio::join!(h.engine.execute(plan.operation_id, &cancel), async {
        blocking.started.notified().await;
        cancel.cancel();
    });

    assert!(matches!(result, Err(EngineError::Cancelled { .. })));
    let snapshot = h.engine.status(plan.operation_id).await.unwrap();
    assert_eq!(snapshot.state, State::Failed);
    assert_eq!(snapshot.phase(&pid("/wait")).unwrap().state, State::Failed);
    assert_eq!(snapshot.phase(&pid("/after")).unwrap().state, State::Unstarted);
    assert!(h.scripted.calls(AttemptKind::Rollback).is_empty());
    assert!(!snapshot.archived);
}

#[tokio::test]
async fn cancelled_rollback_stays_failed_until_retried() {
    let h = harness(
        Scripted::default().fail_execute("/b", u32::MAX),
        EngineConfig::default()
            .with_retry(RetryConfig::none())
            .with_auto_rollback(false),
    );
    let stalling = Arc::new(StallingRollback::default());
    h.handlers.register(kind("stall"), stalling.clone());
    let plan = plan([
        PhaseSpec::new(pid("/a"), kind("stall")),
        step("/b").depends_on(pid("/a")),
    ]);
    assert_eq!(h.run(&plan).await.unwrap().state, State::Failed);

    let watcher = h.engine.watch(plan.operation_id).await.unwrap();
    let cancel = CancellationToken::new();
    let (result, ()) = tokio::join!(h.engine.rollback(plan.operation_id, &cancel), async {
        stalling.started.notified().await;
        cancel.cancel();
    });

    assert!(matches!(result, Err(EngineError::Cancelled { .. })));
    let snapshot = h.engine.status(plan.operation_id).await.unwrap();
    assert_eq!(snapshot.state, State::Failed);
    assert!(!snapshot.archived);
    let report = snapshot.rollback.clone().unwrap();
    assert!(report.interrupted);
    assert!(report.failed.is_empty());
    assert_eq!(report.blocked, vec![pid("/a")]);
    let a = snapshot.phase(&pid("/a")).unwrap();
    assert_eq!(a.state, State::Completed);
    assert_eq!(a.rollback_attempts, 1);
    assert_eq!(h.repo.list_active().await.unwrap(), vec![plan.operation_id]);
    assert_eq!(h.engine.metrics().counter("rollback_failures_total").get(), 0);

    let events: Vec<_> = watcher.collect().await;
    let last = events.last().unwrap();
    assert_eq!(last.message, "rollback interrupted");
    assert!(last.ends_operation());

    // The interrupted compensation runs again on the next call.
    let snapshot = h
        .engine
        .rollback(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(snapshot.state, State::RolledBack);
    assert_eq!(snapshot.rollback, None);
    assert!(snapshot.archived);
    let a = snapshot.phase(&pid("/a")).unwrap();
    assert_eq!(a.state, State::RolledBack);
    assert_eq!(a.rollback_attempts, 2);
}

#[tokio::test]
async fn concurrent_writer_surfaces_conflict() {
    let h = harness(Scripted::default(), EngineConfig::default());
    h.handlers.register(
        kind("meddle"),
        Arc::new(Meddler {
            repo: Arc::clone(&h.repo),
        }),
    );
    let plan = plan([PhaseSpec::new(pid("/m"), kind("meddle"))]);

    let err = h.run(&plan).await.unwrap_err();

    assert!(err.is_conflict(), "unexpected error: {err}");
    let stored = h.engine.status(plan.operation_id).await.unwrap();
    assert_eq!(stored.state, State::InProgress);
}

// ---------------------------------------------------------------------------
// Rollback residue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_rollback_blocks_dependencies_and_is_reported() {
    let h = harness(
        Scripted::default()
            .fail_execute("/c", u32::MAX)
            .fail_rollback("/b", u32::MAX),
        EngineConfig::default().with_retry(RetryConfig::none()),
    );
    let plan = plan([step("/a"), step("/b").depends_on(pid("/a")), step("/c")]);

    let snapshot = h.run(&plan).await.unwrap();

    assert_eq!(snapshot.state, State::RolledBack);
    let report = snapshot.rollback.clone().unwrap();
    assert_eq!(report.failed, vec![pid("/b")]);
    assert_eq!(report.blocked, vec![pid("/a")]);
    assert!(!report.interrupted);

    let b = snapshot.phase(&pid("/b")).unwrap();
    assert_eq!(b.state, State::Completed);
    assert_eq!(b.rollback_attempts, 1);
    assert!(b.rollback_error.is_some());
    assert_eq!(snapshot.phase(&pid("/a")).unwrap().state, State::Completed);
    assert_eq!(h.scripted.calls(AttemptKind::Rollback), vec!["/b"]);
    assert_eq!(h.engine.metrics().counter("rollback_failures_total").get(), 1);
}

#[tokio::test]
async fn rollback_of_abandoned_plan() {
    let h = harness(Scripted::default(), EngineConfig::default());
    let plan = plan([step("/a"), step("/b")]);
    h.engine.submit(&plan).await.unwrap();

    let mut stored = h.repo.load(plan.operation_id).await.unwrap();
    stored.transition(State::InProgress).unwrap();
    stored.transition_phase(&pid("/a"), State::InProgress).unwrap();
    stored.transition_phase(&pid("/a"), State::Completed).unwrap();
    stored.transition_phase(&pid("/b"), State::InProgress).unwrap();
    stored.phase_mut(&pid("/b")).unwrap().begin_attempt(AttemptKind::Execute);
    h.repo.save(&mut stored).await.unwrap();

    let snapshot = h
        .engine
        .rollback(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.state, State::RolledBack);
    assert_eq!(snapshot.phase(&pid("/a")).unwrap().state, State::RolledBack);
    assert_eq!(snapshot.phase(&pid("/b")).unwrap().state, State::Failed);
    assert_eq!(h.scripted.calls(AttemptKind::Rollback), vec!["/a"]);
}

// ---------------------------------------------------------------------------
// Progress, status and validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn watch_yields_transitions_until_terminal() {
    let h = harness(Scripted::default(), EngineConfig::default());
    let plan = plan([step("/a"), step("/b").depends_on(pid("/a"))]);
    h.engine.submit(&plan).await.unwrap();

    let watcher = h.engine.watch(plan.operation_id).await.unwrap();
    h.engine
        .execute(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap();
    let events: Vec<_> = watcher.collect().await;

    let first = events.first().unwrap();
    assert_eq!(first.phase_id, None);
    assert_eq!((first.from_state, first.to_state), (State::Unstarted, State::InProgress));
    let last = events.last().unwrap();
    assert!(last.ends_operation());
    assert_eq!(last.to_state, State::Completed);

    let completed: Vec<_> = events
        .iter()
        .filter(|e| e.to_state == State::Completed && e.phase_id.is_some())
        .map(|e| e.phase_id.clone().unwrap())
        .collect();
    assert_eq!(completed, vec![pid("/a"), pid("/b")]);

    // A finished plan yields an already-ended stream.
    let after: Vec<_> = h.engine.watch(plan.operation_id).await.unwrap().collect().await;
    assert!(after.is_empty());
}

#[rstest]
#[case::stops_at_failed(false, State::Failed)]
#[case::rolls_back(true, State::RolledBack)]
#[tokio::test]
async fn watch_ends_when_run_stops(#[case] auto_rollback: bool, #[case] end: State) {
    let h = harness(
        Scripted::default().fail_execute("/a", u32::MAX),
        EngineConfig::default()
            .with_retry(RetryConfig::none())
            .with_auto_rollback(auto_rollback),
    );
    let plan = plan([step("/a")]);
    h.engine.submit(&plan).await.unwrap();

    let watcher = h.engine.watch(plan.operation_id).await.unwrap();
    let snapshot = h
        .engine
        .execute(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(snapshot.state, end);
    let events: Vec<_> = watcher.collect().await;

    let last = events.last().unwrap();
    assert_eq!(last.phase_id, None);
    assert_eq!(last.to_state, end);
    assert_eq!(events.iter().filter(|e| e.ends_operation()).count(), 1);
    assert!(
        events
            .iter()
            .any(|e| e.phase_id.is_none() && e.to_state == State::Failed && e.message == "1 phase(s) failed")
    );
}

#[tokio::test]
async fn unknown_operation_is_not_found() {
    let h = harness(Scripted::default(), EngineConfig::default());
    let id = OperationId::v4();
    assert!(matches!(
        h.engine.status(id).await,
        Err(EngineError::NotFound { operation_id }) if operation_id == id
    ));
    assert!(matches!(
        h.engine.execute(id, &CancellationToken::new()).await,
        Err(EngineError::NotFound { .. })
    ));
    assert!(h.engine.watch(id).await.is_err());
}

#[tokio::test]
async fn submit_rejects_unknown_action() {
    let h = harness(Scripted::default(), EngineConfig::default());
    let plan = plan([PhaseSpec::new(pid("/x"), kind("missing"))]);
    let err = h.engine.submit(&plan).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownAction(k) if k == kind("missing")));
    assert!(h.repo.list_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn execute_revalidates_stored_plan() {
    let h = harness(Scripted::default(), EngineConfig::default());
    let plan = plan([step("/a"), step("/b").depends_on(pid("/a"))]);

    // Corrupt the stored record into a cycle.
    let mut raw = serde_json::to_value(&plan).unwrap();
    raw["phases"][0]["dependencies"] = serde_json::json!(["/b"]);
    let cyclic: Plan = serde_json::from_value(raw).unwrap();
    h.repo.create(&cyclic).await.unwrap();

    let err = h
        .engine
        .execute(plan.operation_id, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(PlanError::CyclicDependency { .. })
    ));
    assert!(h.scripted.calls(AttemptKind::Execute).is_empty());
}
