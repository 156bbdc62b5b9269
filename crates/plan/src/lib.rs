#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Plan
//!
//! The plan model: an operation described as a directed acyclic graph of
//! phases, plus the live state each phase and the plan as a whole carry
//! while the engine drives them.
//!
//! - [`PhaseSpec`] declares one unit of work: id, dependencies, action kind, payload
//! - [`Phase`] is a spec plus its execution state and attempt history
//! - [`Plan`] is the persisted, versioned aggregate
//! - [`PlanBuilder`] / [`build_plan`] construct validated plans
//! - [`validate`] / [`validate_specs`] check shape (duplicates, dangling references, cycles)
//! - [`PhaseGraph`] answers ordering questions (topological order, levels, dependents)
//! - [`State`] and the transition tables in [`transition`]
//! - [`RetryConfig`] the bounded exponential backoff policy

pub mod builder;
pub mod error;
pub mod graph;
pub mod phase;
pub mod plan;
pub mod retry;
pub mod state;
pub mod transition;
pub mod validate;

pub use builder::{PlanBuilder, build_plan};
pub use error::PlanError;
pub use graph::PhaseGraph;
pub use phase::{AttemptKind, Phase, PhaseAttempt, PhaseSpec};
pub use plan::{OperationKind, Plan, RollbackReport};
pub use retry::RetryConfig;
pub use state::State;
pub use transition::{
    can_transition_phase, can_transition_plan, validate_phase_transition,
    validate_plan_transition,
};
pub use validate::{validate, validate_specs};
