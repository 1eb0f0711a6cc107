use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(
    name = "recall",
    about = "Samples the screen and indexes what it sees",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the capture sampler
    Capture,

    /// Wait for the stores, then drain the inbox
    Ingest,

    /// Suspend capture until `resume`
    Pause,

    /// Lift a previous `pause`
    Resume,

    /// Show pause state and inbox backlog
    Status,
}
