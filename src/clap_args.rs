use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Verbose mode (-v, --verbose)
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example scenario config to ./canopy.toml
    Init,

    /// Check that a scenario config resolves into a complete system
    Validate {
        /// Path to the scenario config
        #[arg(default_value = "./canopy.toml")]
        config: PathBuf,
    },

    /// Print usage summaries for every usage pattern and server
    Summary {
        /// Path to the scenario config
        #[arg(default_value = "./canopy.toml")]
        config: PathBuf,
    },

    /// Print the synthesized hourly usage series for one usage pattern
    Usage {
        /// Path to the scenario config
        #[arg(default_value = "./canopy.toml")]
        config: PathBuf,

        /// Name of the usage pattern
        #[arg(short, long)]
        pattern: String,
    },

    /// List every sourced assumption in the system
    Assumptions {
        /// Path to the scenario config
        #[arg(default_value = "./canopy.toml")]
        config: PathBuf,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
