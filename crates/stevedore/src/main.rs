use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::app::{App, Commands};
use crate::config::CliConfig;

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let app = App::parse();
    init_tracing(app.verbose);

    let config = CliConfig::load(&app.config)?;
    let outcome = match &app.cmd {
        Commands::App(arg) => cli::download::application(&config.manager()?, arg).await?,
        Commands::Upgrade(arg) => cli::download::upgrade(&config.manager()?, arg).await,
        Commands::Manifest(arg) => cli::download::manifest(&config.manager()?, arg).await?,
        Commands::Layout => cli::layout::print(&config),
    };
    Ok(outcome.exit_code())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
