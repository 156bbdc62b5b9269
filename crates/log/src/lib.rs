#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Log
//!
//! Subscriber setup for Gantry binaries. Library crates only emit through
//! `tracing`; a binary calls [`LoggerBuilder::build`] once at startup.
//!
//! - [`Config`] -- filter, output format and display switches
//! - [`LoggerBuilder`] -- installs the global subscriber
//! - [`LoggerGuard`] -- keeps the logger alive and reloads its filter
//!
//! ```no_run
//! use gantry_log::{Config, LoggerBuilder};
//!
//! let _guard = LoggerBuilder::from_config(Config::from_env()).build()?;
//! tracing::info!("ready");
//! # Ok::<(), gantry_log::LogError>(())
//! ```

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, Format};
pub use error::{LogError, LogResult};
