// ABOUTME: Entry point for the hangar CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use hangar::config::{self, Config};
use hangar::error::Result;
use hangar::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let mode = OutputMode::from_flags(cli.quiet, cli.json);
    let result = run(cli, mode).await;

    if let Err(e) = result {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let output = Output::new(mode);
    match cli.command {
        Commands::Init { zone, force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, zone.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Check => {
            let config = load_config(&cli.config)?;
            commands::check(config, &cli.fleet, output).await
        }
        Commands::RenderLb { id } => {
            let config = load_config(&cli.config)?;
            commands::render_lb(config, &cli.fleet, id, output).await
        }
        Commands::PlanRetention { id, days, now } => {
            let config = load_config(&cli.config)?;
            commands::plan_retention(config, &cli.fleet, id, days, now.as_deref(), output).await
        }
        Commands::Status { kind, id } => {
            let config = load_config(&cli.config)?;
            commands::status(config, &cli.fleet, kind, id, output).await
        }
    }
}

fn load_config(path: &Option<std::path::PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}
