//! Subcommand implementations.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use futures::{FutureExt, StreamExt};
use gantry_core::{ActionKind, OperationId};
use gantry_engine::{PlanEngine, PlanSnapshot};
use gantry_plan::{PhaseGraph, State, validate_specs};
use gantry_ports::PlanRepo;
use gantry_runtime::HandlerRegistry;
use gantry_runtime::handlers::{CommandHandler, NoopHandler};
use gantry_storage::{FileBackend, KvPlanRepo};
use tokio_util::sync::CancellationToken;

use crate::config::CliConfig;
use crate::plan_file::PlanFile;
use crate::render;

/// Handlers available to plans run from the command line.
pub fn builtin_handlers() -> anyhow::Result<HandlerRegistry> {
    let registry = HandlerRegistry::new();
    registry.register("noop".parse::<ActionKind>()?, Arc::new(NoopHandler));
    registry.register("command".parse::<ActionKind>()?, Arc::new(CommandHandler));
    Ok(registry)
}

/// Parse and validate a plan file, then print its execution levels.
pub fn validate(file: &Path) -> anyhow::Result<()> {
    let plan_file = PlanFile::read(file)?;
    let errors = validate_specs(&plan_file.phases);
    if !errors.is_empty() {
        for err in &errors {
            eprintln!("  {err}");
        }
        bail!("{} has {} error(s)", file.display(), errors.len());
    }
    let plan = plan_file.into_plan()?;
    builtin_handlers()?
        .check_plan(&plan)
        .context("plan uses an action this binary cannot run")?;
    let levels = PhaseGraph::from_plan(&plan)?.levels()?;

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{} is valid: {} phase(s) in {} level(s)",
        file.display(),
        plan.phases.len(),
        levels.len()
    )?;
    for (depth, level) in levels.iter().enumerate() {
        let ids: Vec<String> = level.iter().map(ToString::to_string).collect();
        writeln!(out, "level {depth}: {}", ids.join(", "))?;
    }
    Ok(())
}

/// An engine over the file-backed state directory.
pub struct App {
    engine: PlanEngine,
}

impl App {
    pub async fn open(config: &CliConfig) -> anyhow::Result<Self> {
        let backend = FileBackend::open(&config.state_dir)
            .await
            .with_context(|| format!("opening state directory {}", config.state_dir.display()))?;
        let repo: Arc<dyn PlanRepo> = Arc::new(KvPlanRepo::new(backend));
        let engine = PlanEngine::new(repo, Arc::new(builtin_handlers()?))
            .with_config(config.engine.clone());
        Ok(Self { engine })
    }

    /// Persist a plan file and print its operation id.
    pub async fn submit(&self, file: &Path) -> anyhow::Result<OperationId> {
        let plan = PlanFile::read(file)?.into_plan()?;
        self.engine.submit(&plan).await.context("submitting plan")?;
        println!("{}", plan.operation_id);
        Ok(plan.operation_id)
    }

    /// Submit and drive a plan to completion.
    pub async fn run(&self, file: &Path, cancel: &CancellationToken) -> anyhow::Result<()> {
        let operation_id = self.submit(file).await?;
        let snapshot = self
            .follow(operation_id, self.engine.execute(operation_id, cancel))
            .await?;
        expect_state(&snapshot, State::Completed)
    }

    /// Continue a persisted plan.
    pub async fn resume(
        &self,
        operation_id: OperationId,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let snapshot = self
            .follow(operation_id, self.engine.resume(operation_id, cancel))
            .await?;
        expect_state(&snapshot, State::Completed)
    }

    /// Roll back a failed or abandoned plan.
    pub async fn rollback(
        &self,
        operation_id: OperationId,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let snapshot = self
            .follow(operation_id, self.engine.rollback(operation_id, cancel))
            .await?;
        expect_state(&snapshot, State::RolledBack)?;
        if let Some(report) = &snapshot.rollback {
            bail!(
                "rollback left {} failed and {} blocked phase(s)",
                report.failed.len(),
                report.blocked.len()
            );
        }
        Ok(())
    }

    /// Print the status of a plan.
    pub async fn status(&self, operation_id: OperationId, json: bool) -> anyhow::Result<()> {
        let snapshot = self.engine.status(operation_id).await?;
        let mut out = std::io::stdout().lock();
        if json {
            serde_json::to_writer_pretty(&mut out, &snapshot)?;
            writeln!(out)?;
        } else {
            render::status(&mut out, &snapshot)?;
        }
        Ok(())
    }

    /// Print every plan that has not been archived.
    pub async fn list(&self) -> anyhow::Result<()> {
        let ids = self.engine.list_active().await?;
        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            snapshots.push(self.engine.status(id).await?);
        }
        snapshots.sort_by_key(|s| s.updated_at);
        render::list(&mut std::io::stdout().lock(), &snapshots)?;
        Ok(())
    }

    /// Print progress events while `work` runs, then its final summary.
    async fn follow<F>(&self, operation_id: OperationId, work: F) -> anyhow::Result<PlanSnapshot>
    where
        F: Future<Output = Result<PlanSnapshot, gantry_engine::EngineError>>,
    {
        let mut events = self.engine.watch(operation_id).await?;
        let mut work = std::pin::pin!(work);
        let result = loop {
            tokio::select! {
                result = &mut work => break result,
                Some(event) = events.next() => println!("{event}"),
            }
        };
        while let Some(Some(event)) = events.next().now_or_never() {
            println!("{event}");
        }
        let snapshot = result?;
        render::summary(&mut std::io::stdout().lock(), &snapshot)?;
        Ok(snapshot)
    }
}

fn expect_state(snapshot: &PlanSnapshot, expected: State) -> anyhow::Result<()> {
    if snapshot.state != expected {
        match &snapshot.latest_message {
            Some(message) => {
                bail!("plan {} ended {}: {message}", snapshot.operation_id, snapshot.state)
            }
            None => bail!("plan {} ended {}", snapshot.operation_id, snapshot.state),
        }
    }
    Ok(())
}
