//! Runs a local program for each direction.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::context::PhaseContext;
use crate::error::HandlerError;
use crate::handler::{PhaseHandler, parse_data};

/// Bytes of stderr kept in error messages.
const STDERR_TAIL: usize = 512;

/// Payload of a `command` phase.
///
/// ```json
/// {"execute": ["systemctl", "start", "planet"], "rollback": ["systemctl", "stop", "planet"]}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandSpec {
    /// Program and arguments run by `execute`.
    pub execute: Vec<String>,
    /// Program and arguments run by `rollback`; absent means nothing to undo.
    #[serde(default)]
    pub rollback: Vec<String>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory.
    #[serde(default)]
    pub workdir: Option<String>,
}

/// Runs [`CommandSpec`] programs; a non-zero exit is a retryable failure.
/// The child is killed when the plan is cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandHandler;

impl CommandHandler {
    async fn run(
        ctx: &PhaseContext,
        argv: &[String],
        spec: &CommandSpec,
    ) -> Result<(), HandlerError> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .envs(&spec.env)
            .env("GANTRY_OPERATION_ID", ctx.operation_id.to_string())
            .env("GANTRY_PHASE_ID", ctx.phase_id.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.workdir {
            command.current_dir(dir);
        }

        tracing::debug!(phase_id = %ctx.phase_id, program = %program, attempt = ctx.attempt, "running command");
        let child = command
            .spawn()
            .map_err(|e| HandlerError::fatal(format!("failed to start `{program}`: {e}")))?;

        let output = tokio::select! {
            output = child.wait_with_output() => output
                .map_err(|e| HandlerError::transient(format!("`{program}` failed: {e}")))?,
            () = ctx.cancelled() => return Err(HandlerError::Cancelled),
        };

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = tail(stderr.trim(), STDERR_TAIL);
        Err(HandlerError::transient(format!(
            "`{program}` exited with {}: {tail}",
            output.status
        )))
    }
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[async_trait]
impl PhaseHandler for CommandHandler {
    async fn execute(
        &self,
        ctx: &PhaseContext,
        data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let spec: CommandSpec = parse_data(data)?;
        if spec.execute.is_empty() {
            return Err(HandlerError::InvalidData("`execute` must name a program".into()));
        }
        Self::run(ctx, &spec.execute, &spec).await
    }

    async fn rollback(
        &self,
        ctx: &PhaseContext,
        data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let spec: CommandSpec = parse_data(data)?;
        Self::run(ctx, &spec.rollback, &spec).await
    }
}
