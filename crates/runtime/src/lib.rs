#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Runtime
//!
//! The phase executor registry: maps a phase's [`ActionKind`](gantry_core::ActionKind)
//! to a [`PhaseHandler`] exposing `execute` and `rollback`.
//!
//! - [`PhaseHandler`] -- the forward/compensating pair every action implements
//! - [`PhaseContext`] -- identity, attempt number and cancellation for one call
//! - [`HandlerRegistry`] -- `register` / `get` by action kind
//! - [`UpsertRegistry`] -- `ResourceKind -> UpsertHandler` map for cluster objects
//! - [`handlers`] -- built-in handlers (`noop`, `command`, `resources`, `images`)
//!
//! Handlers must be idempotent: the engine re-invokes `execute` for a phase
//! left `InProgress` by a crashed process.

pub mod context;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod upsert;

pub use context::PhaseContext;
pub use error::{HandlerError, RuntimeError};
pub use handler::{PhaseHandler, parse_data};
pub use registry::HandlerRegistry;
pub use upsert::{CreateOrUpdate, UpsertHandler, UpsertOutcome, UpsertRegistry};
