// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hangar")]
#[command(about = "Lifecycle manager for hosted application instances and their load balancers")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (default: discovered hangar.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Fleet snapshot to operate on
    #[arg(short, long, global = true, default_value = "fleet.yml")]
    pub fleet: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new hangar.yml configuration file
    Init {
        /// DNS zone managed for instance domains
        #[arg(long)]
        zone: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration and the fleet snapshot
    Check,

    /// Render the configuration a load balancer would receive
    RenderLb {
        /// Load balancer id
        id: u64,
    },

    /// Show which appservers of an instance retention would terminate
    PlanRetention {
        /// Instance id
        id: u64,

        /// Retention window in days (default: from configuration)
        #[arg(long)]
        days: Option<u32>,

        /// Evaluate at this RFC 3339 time instead of now
        #[arg(long)]
        now: Option<String>,
    },

    /// Show a resource's state and available operations
    Status {
        #[arg(value_enum)]
        kind: KindArg,

        id: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Instance,
    Appserver,
    Server,
    Lb,
}
