//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gantry_core::OperationId;
use gantry_log::Format;

/// Durable, resumable plan runner for cluster lifecycle operations.
#[derive(Debug, Parser)]
#[command(name = "gantry", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand. They override the config file and
/// `GANTRY_*` environment variables.
#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// Config file; defaults to `gantry.toml` in the working directory.
    #[arg(long, global = true, env = "GANTRY_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding persisted plans.
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Upper bound on phases running at once.
    #[arg(long, global = true, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Leave failed plans as they are instead of rolling them back.
    #[arg(long, global = true)]
    pub no_rollback: bool,

    /// Log filter directive, e.g. `debug` or `gantry_engine=trace`.
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Log output format.
    #[arg(long, global = true, value_parser = parse_format, value_name = "FORMAT")]
    pub log_format: Option<Format>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a plan file and print its execution levels.
    Validate {
        /// Plan file (YAML or JSON).
        file: PathBuf,
    },
    /// Persist a plan file and print its operation id.
    Submit {
        /// Plan file (YAML or JSON).
        file: PathBuf,
    },
    /// Submit a plan file and execute it, printing progress.
    Run {
        /// Plan file (YAML or JSON).
        file: PathBuf,
    },
    /// Continue a persisted plan.
    Resume {
        /// Operation id.
        #[arg(value_parser = parse_operation_id)]
        id: OperationId,
    },
    /// Compensate the completed phases of a failed plan.
    Rollback {
        /// Operation id.
        #[arg(value_parser = parse_operation_id)]
        id: OperationId,
    },
    /// Show the state of a plan.
    Status {
        /// Operation id.
        #[arg(value_parser = parse_operation_id)]
        id: OperationId,
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List plans that have not been archived.
    List,
}

fn parse_operation_id(raw: &str) -> Result<OperationId, String> {
    OperationId::parse(raw).map_err(|err| err.to_string())
}

fn parse_format(raw: &str) -> Result<Format, String> {
    raw.parse().map_err(|err: gantry_log::LogError| err.to_string())
}
