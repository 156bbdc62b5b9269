#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Engine
//!
//! Drives a persisted [`Plan`](gantry_plan::Plan) to a terminal state.
//!
//! - [`PlanEngine`] -- `submit`, `execute`, `resume`, `rollback`, `status`, `watch`
//! - [`EngineConfig`] -- concurrency limit, default retry policy, auto-rollback
//! - [`PlanSnapshot`] -- read-only status view of a plan
//! - [`EngineError`] -- errors returned to the caller; handler failures are
//!   absorbed into phase state instead
//!
//! Every phase transition is saved through the [`PlanRepo`](gantry_ports::PlanRepo)
//! before the next decision is made, so a crashed run resumes from whatever
//! was last persisted.

pub mod config;
pub mod engine;
pub mod error;
pub mod snapshot;
mod sweep;

pub use config::EngineConfig;
pub use engine::PlanEngine;
pub use error::EngineError;
pub use snapshot::{PhaseSnapshot, PlanSnapshot, StateCounts};
