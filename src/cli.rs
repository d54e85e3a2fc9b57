//! Command-line interface definitions for portwatch.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// TCP listening-port monitor.
///
/// portwatch snapshots the operating system's TCP table, reports which local
/// ports are listening and which process owns each one, and can poll for
/// changes and print the ports that opened or closed between scans.
#[derive(Parser, Debug)]
#[command(name = "portwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to additional config file.
    ///
    /// Merged on top of the system and user configs, giving it the highest
    /// priority except for CLI flags.
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Subcommands for portwatch.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan once and print the currently listening ports.
    List,

    /// Poll for changes and print opened/closed ports until interrupted.
    Watch {
        /// Polling interval in milliseconds (overrides config).
        #[arg(long = "interval-ms", value_name = "MS")]
        interval_ms: Option<u64>,
    },
}

impl Cli {
    /// The polling-interval override carried by the active subcommand, if
    /// any.
    pub fn interval_override(&self) -> Option<u64> {
        match &self.command {
            Commands::Watch { interval_ms } => *interval_ms,
            Commands::List => None,
        }
    }
}
