//! memocall command line interface.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::config::DEFAULT_CONFIG_FILE;

/// memocall - memoizing call cache demos.
#[derive(Parser, Debug)]
#[command(name = "memocall")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Verbose mode.
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode.
    #[arg(short, long)]
    pub quiet: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Writes a default configuration file.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Computes a Fibonacci number with a memoized recursive function.
    Fib {
        /// Index of the Fibonacci number (at most 186).
        n: u64,
    },

    /// Squares each value, reusing results for repeated values.
    Square {
        /// Values to square.
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<i64>,
    },

    /// Calls one slow async computation from many tasks at once.
    Stress {
        /// Number of concurrent callers (default from config).
        #[arg(long)]
        callers: Option<usize>,

        /// Simulated computation time in milliseconds (default from config).
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Shows the effective configuration.
    Config,

    /// Shows version.
    Version,
}
