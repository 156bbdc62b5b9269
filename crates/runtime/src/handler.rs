//! The phase handler trait.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::context::PhaseContext;
use crate::error::HandlerError;

/// Forward and compensating operations for one action kind.
///
/// Stored in the [`HandlerRegistry`](crate::HandlerRegistry) as
/// `Arc<dyn PhaseHandler>`. Both calls may be repeated after a crash, so
/// implementations detect-and-skip work that is already done or use
/// naturally idempotent operations such as create-or-update.
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Carry out the phase.
    async fn execute(&self, ctx: &PhaseContext, data: &serde_json::Value)
    -> Result<(), HandlerError>;

    /// Undo a completed phase.
    async fn rollback(
        &self,
        ctx: &PhaseContext,
        data: &serde_json::Value,
    ) -> Result<(), HandlerError>;
}

/// Deserialize a phase payload, mapping failures to [`HandlerError::InvalidData`].
pub fn parse_data<T: DeserializeOwned>(data: &serde_json::Value) -> Result<T, HandlerError> {
    T::deserialize(data).map_err(|e| HandlerError::InvalidData(e.to_string()))
}
