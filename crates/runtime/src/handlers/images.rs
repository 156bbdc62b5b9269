//! Pushes container images into a cluster-local registry.

use std::sync::Arc;

use async_trait::async_trait;
use gantry_ports::ImageRegistry;
use serde::Deserialize;

use crate::context::PhaseContext;
use crate::error::HandlerError;
use crate::handler::{PhaseHandler, parse_data};

/// Payload of an `images` phase.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSet {
    /// Registry address, e.g. `leader.telekube.local:5000`.
    pub registry: String,
    /// Image references to push.
    pub images: Vec<String>,
}

/// Pushes every image in [`ImageSet`]. Pushing is idempotent.
#[derive(Clone)]
pub struct ImagesHandler {
    registry: Arc<dyn ImageRegistry>,
}

impl ImagesHandler {
    /// Handler pushing through `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn ImageRegistry>) -> Self {
        Self { registry }
    }
}

impl std::fmt::Debug for ImagesHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagesHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl PhaseHandler for ImagesHandler {
    async fn execute(
        &self,
        ctx: &PhaseContext,
        data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let set: ImageSet = parse_data(data)?;
        for image in &set.images {
            if ctx.is_cancelled() {
                return Err(HandlerError::Cancelled);
            }
            self.registry.push(image, &set.registry).await?;
            tracing::info!(phase_id = %ctx.phase_id, image = %image, registry = %set.registry, "pushed image");
        }
        Ok(())
    }

    /// Images are content-addressed; leaving them in the registry is harmless.
    async fn rollback(
        &self,
        ctx: &PhaseContext,
        _data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        tracing::debug!(phase_id = %ctx.phase_id, "images stay in registry on rollback");
        Ok(())
    }
}
