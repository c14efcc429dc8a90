use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ot_cli::commands::{ingest, replay, results, splits};
use ot_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    match &cli.command {
        Some(Commands::Results { race, group }) => {
            results::run(&config.race_dir.join(race), group.as_deref())?;
        }
        Some(Commands::Splits { race, group }) => {
            splits::run(&config.race_dir.join(race), group.as_deref())?;
        }
        Some(Commands::Ingest { race, readout }) => {
            ingest::run(&config.race_dir.join(race), readout)?;
        }
        Some(Commands::Replay { race, log, poll_ms }) => {
            replay::run(&config.race_dir.join(race), log, *poll_ms)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
