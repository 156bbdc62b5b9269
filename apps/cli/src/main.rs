//! `gantry`: submit, run, resume, roll back and inspect plans from the shell.

mod cli;
mod commands;
mod config;
mod plan_file;
mod render;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use gantry_log::LoggerBuilder;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command};
use crate::commands::App;
use crate::config::CliConfig;

/// Status reported for every failure.
const EXIT_FAILURE: u8 = 255;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(&cli.global)?;
    let _logger = LoggerBuilder::from_config(config.log.clone())
        .build()
        .context("installing logger")?;
    tracing::debug!(state_dir = %config.state_dir.display(), "configuration loaded");

    if let Command::Validate { file } = &cli.command {
        return commands::validate(file);
    }

    let app = App::open(&config).await?;
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Command::Validate { .. } => Ok(()),
        Command::Submit { file } => app.submit(&file).await.map(drop),
        Command::Run { file } => app.run(&file, &cancel).await,
        Command::Resume { id } => app.resume(id, &cancel).await,
        Command::Rollback { id } => app.rollback(id, &cancel).await,
        Command::Status { id, json } => app.status(id, json).await,
        Command::List => app.list().await,
    }
}
