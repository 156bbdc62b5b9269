//! Bounded retry with exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often, and how patiently, a failing handler call is retried.
///
/// `max_attempts` counts every call including the first, so `max_attempts = 3`
/// means one call plus up to two retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of calls allowed for one phase step. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied after every failed call.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// A single call, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Constant delay between calls.
    #[must_use]
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }

    /// Doubling delay, capped at `max_delay_ms`.
    #[must_use]
    pub fn exponential(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            backoff_multiplier: 2.0,
        }
    }

    /// Override the growth factor.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Whether another call is allowed after `failures` failed calls.
    #[must_use]
    pub fn allows_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts.max(1)
    }

    /// Delay to wait after the `failures`-th failed call (1-based).
    #[must_use]
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(63) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.max(1.0).powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential(3, 500, 30_000)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_is_three_exponential_attempts() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.backoff(1), Duration::from_millis(500));
        assert_eq!(cfg.backoff(2), Duration::from_millis(1_000));
    }

    #[test]
    fn allows_retry_counts_first_call() {
        let cfg = RetryConfig::fixed(3, 10);
        assert!(cfg.allows_retry(1));
        assert!(cfg.allows_retry(2));
        assert!(!cfg.allows_retry(3));
    }

    #[test]
    fn none_never_retries() {
        assert!(!RetryConfig::none().allows_retry(1));
        assert_eq!(RetryConfig::none().backoff(1), Duration::ZERO);
    }

    #[test]
    fn zero_attempts_behaves_like_one() {
        let cfg = RetryConfig::fixed(0, 10);
        assert!(cfg.allows_retry(0));
        assert!(!cfg.allows_retry(1));
    }

    #[test]
    fn backoff_is_capped() {
        let cfg = RetryConfig::exponential(10, 100, 500);
        assert_eq!(cfg.backoff(3), Duration::from_millis(400));
        assert_eq!(cfg.backoff(4), Duration::from_millis(500));
        assert_eq!(cfg.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn custom_multiplier() {
        let cfg = RetryConfig::exponential(5, 100, 10_000).with_multiplier(3.0);
        assert_eq!(cfg.backoff(3), Duration::from_millis(900));
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = RetryConfig::fixed(4, 250);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
