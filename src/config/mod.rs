pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "mailroom-engine")]
#[command(about = "Package number allocation and lifecycle engine for mailrooms")]
pub struct CliConfig {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "mailroom.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines (overrides the config file)
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Subcommand)]
pub enum Command {
    /// Provision every configured mailroom and print pool status as JSON
    Status {
        /// Include the state of every slot
        #[arg(long)]
        slots: bool,
    },
    /// Register packages concurrently in every mailroom, pick half of them up,
    /// and print the resulting pool status
    Simulate {
        /// Packages registered per mailroom
        #[arg(long, default_value = "50")]
        packages: usize,
    },
}
