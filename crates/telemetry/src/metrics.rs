//! In-memory metrics.
//!
//! Handles are cheap clones sharing one atomic cell, so the engine can keep a
//! handle per metric instead of looking names up on the hot path.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Monotonic counter.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    /// Add one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Add `n`.
    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Value that moves both ways.
#[derive(Debug, Clone, Default)]
pub struct Gauge(Arc<AtomicI64>);

impl Gauge {
    /// Add one.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Subtract one.
    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    /// Overwrite the value.
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Summary {
    count: u64,
    sum: f64,
    max: f64,
}

/// Running summary of observed values: count, sum and maximum.
#[derive(Debug, Clone, Default)]
pub struct Histogram(Arc<Mutex<Summary>>);

impl Histogram {
    /// Record one observation.
    pub fn observe(&self, value: f64) {
        let mut summary = self.0.lock();
        summary.count += 1;
        summary.sum += value;
        if value > summary.max {
            summary.max = value;
        }
    }

    /// Number of observations.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.0.lock().count
    }

    /// Sum of observations.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.0.lock().sum
    }

    /// Largest observation, `0.0` when empty.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.0.lock().max
    }

    /// Mean observation, `None` when empty.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        let summary = self.0.lock();
        #[allow(clippy::cast_precision_loss)]
        (summary.count > 0).then(|| summary.sum / summary.count as f64)
    }
}

/// Named metrics, created on first use.
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<DashMap<String, Counter>>,
    gauges: Arc<DashMap<String, Gauge>>,
    histograms: Arc<DashMap<String, Histogram>>,
}

impl MetricsRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter named `name`.
    #[must_use]
    pub fn counter(&self, name: &str) -> Counter {
        self.counters.entry(name.to_owned()).or_default().clone()
    }

    /// Gauge named `name`.
    #[must_use]
    pub fn gauge(&self, name: &str) -> Gauge {
        self.gauges.entry(name.to_owned()).or_default().clone()
    }

    /// Histogram named `name`.
    #[must_use]
    pub fn histogram(&self, name: &str) -> Histogram {
        self.histograms.entry(name.to_owned()).or_default().clone()
    }

    /// Counter values sorted by name.
    #[must_use]
    pub fn counter_values(&self) -> Vec<(String, u64)> {
        let mut values: Vec<_> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect();
        values.sort();
        values
    }
}
