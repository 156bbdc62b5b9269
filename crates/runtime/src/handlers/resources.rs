//! Bootstraps cluster objects through the upsert capability map.

use std::sync::Arc;

use async_trait::async_trait;
use gantry_ports::ResourceObject;
use serde::Deserialize;

use crate::context::PhaseContext;
use crate::error::HandlerError;
use crate::handler::{PhaseHandler, parse_data};
use crate::upsert::UpsertRegistry;

/// Payload of a `resources` phase.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSet {
    /// Objects applied in order and removed in reverse order.
    pub objects: Vec<ResourceObject>,
}

/// Applies every object with create-or-update semantics.
#[derive(Debug, Clone)]
pub struct ResourcesHandler {
    upserts: Arc<UpsertRegistry>,
}

impl ResourcesHandler {
    /// Handler dispatching through `upserts`.
    #[must_use]
    pub fn new(upserts: Arc<UpsertRegistry>) -> Self {
        Self { upserts }
    }
}

#[async_trait]
impl PhaseHandler for ResourcesHandler {
    async fn execute(
        &self,
        ctx: &PhaseContext,
        data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let set: ResourceSet = parse_data(data)?;
        // Fail before touching the cluster if any kind is unsupported.
        for object in &set.objects {
            self.upserts.handler(&object.kind)?;
        }
        for object in &set.objects {
            if ctx.is_cancelled() {
                return Err(HandlerError::Cancelled);
            }
            self.upserts.handler(&object.kind)?.upsert(object).await?;
        }
        Ok(())
    }

    async fn rollback(
        &self,
        ctx: &PhaseContext,
        data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let set: ResourceSet = parse_data(data)?;
        for object in set.objects.iter().rev() {
            if ctx.is_cancelled() {
                return Err(HandlerError::Cancelled);
            }
            self.upserts.handler(&object.kind)?.remove(object).await?;
        }
        Ok(())
    }
}
