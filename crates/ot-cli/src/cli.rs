//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Orienteering race timing.
///
/// Loads a race file, takes card readouts from devices or logs, and
/// computes statuses, places, splits and scores.
#[derive(Debug, Parser)]
#[command(name = "ot", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Recompute and print per-group result lists.
    Results {
        /// The race file.
        race: PathBuf,

        /// Limit output to one group.
        #[arg(long)]
        group: Option<String>,
    },

    /// Print leg analytics per group.
    Splits {
        /// The race file.
        race: PathBuf,

        /// Limit output to one group.
        #[arg(long)]
        group: Option<String>,
    },

    /// Take one readout into the race and save it.
    Ingest {
        /// The race file.
        race: PathBuf,

        /// A JSON file holding one raw readout.
        #[arg(long)]
        readout: PathBuf,
    },

    /// Replay a readout log through the device worker path.
    Replay {
        /// The race file.
        race: PathBuf,

        /// A JSON-lines readout log.
        #[arg(long)]
        log: PathBuf,

        /// Idle poll interval in milliseconds.
        #[arg(long, default_value_t = 50)]
        poll_ms: u64,
    },
}
