#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Telemetry
//!
//! Observation of running plans. Nothing here feeds back into the state
//! machine: the persisted plan is the source of truth, events are projections.
//!
//! - [`ProgressEvent`] -- one phase or plan state transition
//! - [`ProgressBus`] -- process-wide broadcast of progress events
//! - [`ProgressStream`] -- per-operation event sequence ending at a terminal plan state
//! - [`MetricsRegistry`] -- in-memory counters, gauges and histograms

pub mod bus;
pub mod event;
pub mod metrics;

pub use bus::{ProgressBus, ProgressStream};
pub use event::ProgressEvent;
pub use metrics::{Counter, Gauge, Histogram, MetricsRegistry};
