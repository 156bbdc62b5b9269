//! Engine configuration.

use gantry_plan::RetryConfig;
use serde::{Deserialize, Serialize};

/// Tunables for a [`PlanEngine`](crate::PlanEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on concurrently running handler calls. `None` means
    /// unlimited fan-out, constrained only by exclusivity keys.
    pub max_concurrency: Option<usize>,
    /// Retry policy for phases that do not declare their own.
    pub retry: RetryConfig,
    /// Start the rollback sweep as soon as a forward run ends `Failed`.
    pub auto_rollback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            retry: RetryConfig::default(),
            auto_rollback: true,
        }
    }
}

impl EngineConfig {
    /// Limit concurrent handler calls. Zero is treated as one.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max.max(1));
        self
    }

    /// Replace the default retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable automatic rollback.
    #[must_use]
    pub fn with_auto_rollback(mut self, enabled: bool) -> Self {
        self.auto_rollback = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrency, None);
        assert!(config.auto_rollback);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        assert_eq!(EngineConfig::default().with_max_concurrency(0).max_concurrency, Some(1));
    }

    #[test]
    fn partial_serde_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_concurrency": 4}"#).unwrap();
        assert_eq!(config.max_concurrency, Some(4));
        assert!(config.auto_rollback);
        assert_eq!(config.retry, RetryConfig::default());
    }
}
