use async_trait::async_trait;

use crate::context::PhaseContext;
use crate::error::HandlerError;
use crate::handler::PhaseHandler;

/// Does nothing in either direction. Useful for grouping phases.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

#[async_trait]
impl PhaseHandler for NoopHandler {
    async fn execute(
        &self,
        ctx: &PhaseContext,
        _data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        tracing::debug!(phase_id = %ctx.phase_id, "noop execute");
        Ok(())
    }

    async fn rollback(
        &self,
        ctx: &PhaseContext,
        _data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        tracing::debug!(phase_id = %ctx.phase_id, "noop rollback");
        Ok(())
    }
}
