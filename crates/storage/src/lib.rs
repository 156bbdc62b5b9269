#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Storage
//!
//! The persistence adapter: plans stored as opaque versioned records in a
//! key-value backend.
//!
//! - [`Codec`] -- how a plan becomes bytes ([`JsonCodec`], [`Base64JsonCodec`])
//! - [`MemoryBackend`] -- in-process [`KvBackend`](gantry_ports::KvBackend)
//! - [`FileBackend`] -- one file per key under a state directory
//! - [`KvPlanRepo`] -- [`PlanRepo`](gantry_ports::PlanRepo) over any backend and codec
//!
//! Live plans live under `/operations/<id>`; archived ones under
//! `/archive/operations/<id>`.

pub mod codec;
pub mod file;
pub mod memory;
pub mod repo;

pub use codec::{Base64JsonCodec, Codec, JsonCodec};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use repo::{KvPlanRepo, archive_key, live_key};
