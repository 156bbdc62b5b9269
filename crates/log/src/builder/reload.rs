//! Runtime filter changes.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing_subscriber::{EnvFilter, Registry, reload};

use crate::error::{LogError, LogResult};

/// Swaps the active filter of an installed logger.
#[derive(Clone)]
pub(crate) struct ReloadHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    current: Arc<RwLock<String>>,
}

impl ReloadHandle {
    pub(crate) fn new(filter: reload::Handle<EnvFilter, Registry>, directive: &str) -> Self {
        Self {
            filter,
            current: Arc::new(RwLock::new(directive.to_owned())),
        }
    }

    pub(crate) fn reload(&self, directive: &str) -> LogResult<()> {
        let filter = parse_filter(directive)?;
        self.filter
            .reload(filter)
            .map_err(|e| LogError::Reload(e.to_string()))?;
        *self.current.write() = directive.to_owned();
        Ok(())
    }

    pub(crate) fn current(&self) -> String {
        self.current.read().clone()
    }
}

pub(crate) fn parse_filter(directive: &str) -> LogResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| LogError::Filter(format!("{directive:?}: {e}")))
}
