#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Core
//!
//! Identifiers shared by every Gantry crate.
//!
//! - [`OperationId`] names one cluster operation (install, expand, upgrade, uninstall)
//! - [`PhaseId`] is a human-readable path naming one phase within a plan
//! - [`ActionKind`] selects the handler that executes a phase
//! - [`ResourceKind`] selects the upsert handler for a cluster object

pub mod id;
pub mod keys;
pub mod phase_id;

pub use id::{OperationId, UuidParseError};
pub use keys::{ActionKind, KeyError, ResourceKind};
pub use phase_id::{PhaseId, PhaseIdError};
