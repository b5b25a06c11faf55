use std::path::PathBuf;

use clap::Parser;

/// Watches TCP, HTTP and Minecraft services and texts you when they go down
#[derive(Debug, Parser)]
#[command(name = "servertracker", version, about)]
pub struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/servertracker/config.toml)
    #[arg(short, long, env = "SERVERTRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// More logging; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Validate the configuration, print it and exit
    #[arg(long, conflicts_with = "once")]
    pub check: bool,

    /// Probe every service once, print the results and exit without sending alerts
    #[arg(long)]
    pub once: bool,
}
