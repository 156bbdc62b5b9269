//! Executor registry: action kind to phase handler.

use std::sync::Arc;

use dashmap::DashMap;
use gantry_core::ActionKind;
use gantry_plan::Plan;

use crate::error::RuntimeError;
use crate::handler::PhaseHandler;

/// Thread-safe registry of phase handlers keyed by [`ActionKind`].
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<ActionKind, Arc<dyn PhaseHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `kind`.
    pub fn register(&self, kind: ActionKind, handler: Arc<dyn PhaseHandler>) {
        tracing::info!(action = %kind, "registered phase handler");
        self.handlers.insert(kind, handler);
    }

    /// Look up the handler for `kind`.
    pub fn get(&self, kind: &ActionKind) -> Result<Arc<dyn PhaseHandler>, RuntimeError> {
        self.handlers
            .get(kind)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RuntimeError::UnknownAction(kind.clone()))
    }

    /// Whether a handler is registered for `kind`.
    #[must_use]
    pub fn contains(&self, kind: &ActionKind) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Remove the handler for `kind`.
    pub fn remove(&self, kind: &ActionKind) -> Option<Arc<dyn PhaseHandler>> {
        self.handlers.remove(kind).map(|(_, handler)| handler)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<ActionKind> {
        let mut kinds: Vec<_> = self.handlers.iter().map(|e| e.key().clone()).collect();
        kinds.sort();
        kinds
    }

    /// Fail with the first action kind in `plan` that has no handler.
    pub fn check_plan(&self, plan: &Plan) -> Result<(), RuntimeError> {
        plan.phases
            .iter()
            .find(|phase| !self.contains(phase.action()))
            .map_or(Ok(()), |phase| {
                Err(RuntimeError::UnknownAction(phase.action().clone()))
            })
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
