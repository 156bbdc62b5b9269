//! Create-or-update of cluster objects, dispatched by resource kind.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use gantry_core::ResourceKind;
use gantry_ports::{PortsError, ResourceClient, ResourceObject};

use crate::error::RuntimeError;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The object did not exist and was created.
    Created,
    /// The object existed and was replaced.
    Updated,
}

/// Idempotent apply and removal of one resource kind.
#[async_trait]
pub trait UpsertHandler: Send + Sync {
    /// Make the cluster hold `object`, creating or updating it.
    async fn upsert(&self, object: &ResourceObject) -> Result<UpsertOutcome, PortsError>;

    /// Remove `object`; an already-absent object is not an error.
    async fn remove(&self, object: &ResourceObject) -> Result<(), PortsError>;
}

/// Create, and on "already exists" update instead.
#[derive(Clone)]
pub struct CreateOrUpdate {
    client: Arc<dyn ResourceClient>,
}

impl CreateOrUpdate {
    /// Wrap a cluster client.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpsertHandler for CreateOrUpdate {
    async fn upsert(&self, object: &ResourceObject) -> Result<UpsertOutcome, PortsError> {
        match self.client.create(object).await {
            Ok(()) => {
                tracing::info!(kind = %object.kind, name = %object.qualified_name(), "created resource");
                Ok(UpsertOutcome::Created)
            }
            Err(err) if err.is_already_exists() => {
                self.client.update(object).await?;
                tracing::info!(kind = %object.kind, name = %object.qualified_name(), "updated resource");
                Ok(UpsertOutcome::Updated)
            }
            Err(err) => Err(err),
        }
    }

    async fn remove(&self, object: &ResourceObject) -> Result<(), PortsError> {
        match self.client.delete(object).await {
            Ok(()) => {
                tracing::info!(kind = %object.kind, name = %object.qualified_name(), "deleted resource");
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Capability map from resource kind to upsert handler.
#[derive(Default)]
pub struct UpsertRegistry {
    handlers: DashMap<ResourceKind, Arc<dyn UpsertHandler>>,
}

impl UpsertRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry handling each of `kinds` with [`CreateOrUpdate`] over `client`.
    #[must_use]
    pub fn with_kinds(
        client: Arc<dyn ResourceClient>,
        kinds: impl IntoIterator<Item = ResourceKind>,
    ) -> Self {
        let registry = Self::new();
        let handler: Arc<dyn UpsertHandler> = Arc::new(CreateOrUpdate::new(client));
        for kind in kinds {
            registry.register(kind, Arc::clone(&handler));
        }
        registry
    }

    /// Register a handler for `kind`.
    pub fn register(&self, kind: ResourceKind, handler: Arc<dyn UpsertHandler>) {
        tracing::debug!(kind = %kind, "registered upsert handler");
        self.handlers.insert(kind, handler);
    }

    /// The handler for `kind`.
    pub fn handler(&self, kind: &ResourceKind) -> Result<Arc<dyn UpsertHandler>, RuntimeError> {
        self.handlers
            .get(kind)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RuntimeError::UnsupportedResource(kind.clone()))
    }

    /// Whether `kind` is supported.
    #[must_use]
    pub fn supports(&self, kind: &ResourceKind) -> bool {
        self.handlers.contains_key(kind)
    }
}

impl std::fmt::Debug for UpsertRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpsertRegistry")
            .field("kinds", &self.handlers.len())
            .finish()
    }
}
