//! Command-line settings for hwtune
//!
//! Defines the operator CLI: global options and the subcommands that drive
//! profile generation, application, benchmarking and monitoring.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// hwtune - Hardware-aware tuning for web hosting stacks
#[derive(Parser, Debug, Clone)]
#[command(name = "hwtune")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Derive, apply and validate hardware-aware tuning profiles")]
#[command(long_about = r#"
hwtune measures host hardware, derives a bounded tuning profile for the web
server, application runtime, database, object cache and kernel, applies it
with backup and rollback, and validates it with benchmarks and monitoring.

Examples:
  hwtune detect                      # Show detected hardware
  hwtune generate auto               # Derive and store profile "auto"
  hwtune apply auto                  # Apply it to all subsystems
  hwtune benchmark auto 5            # Five benchmark rounds
  hwtune monitor --interval 30s      # Watch thresholds every 30 seconds
"#)]
pub struct CliArgs {
    /// Engine configuration file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// State directory for profiles, backups and benchmark history
    #[arg(long, global = true, env = "HWTUNE_STATE_DIR", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only warnings and errors are logged)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Output format for reports
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

impl CliArgs {
    /// Default log level for the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Detect hardware and store a new tuning profile
    #[command(name = "generate")]
    Generate {
        /// Profile name
        name: String,
    },

    /// Apply a stored profile to the managed subsystems
    #[command(name = "apply")]
    Apply {
        /// Profile name
        name: String,
        /// Seconds to wait after activating each subsystem
        #[arg(long, value_name = "SECS")]
        stabilization: Option<u64>,
    },

    /// Benchmark a stored profile
    #[command(name = "benchmark")]
    Benchmark {
        /// Profile name
        name: String,
        /// Number of rounds
        rounds: Option<u32>,
        /// Show progress bars
        #[arg(short = 'p', long)]
        progress: bool,
    },

    /// List stored profiles
    #[command(name = "list-profiles")]
    ListProfiles,

    /// Show the active profile
    #[command(name = "current-profile")]
    CurrentProfile,

    /// Watch metrics and log threshold breaches
    #[command(name = "monitor")]
    Monitor {
        /// Sampling interval (e.g. 60s, 5m)
        #[arg(long, value_parser = humantime::parse_duration, value_name = "DURATION")]
        interval: Option<Duration>,
        /// Stop after this long instead of running until interrupted
        #[arg(long, value_parser = humantime::parse_duration, value_name = "DURATION")]
        duration: Option<Duration>,
    },

    /// Show a stored profile
    #[command(name = "show")]
    Show {
        /// Profile name
        name: String,
    },

    /// Delete a stored profile
    #[command(name = "delete")]
    Delete {
        /// Profile name
        name: String,
    },

    /// Show detected hardware without storing anything
    #[command(name = "detect")]
    Detect,

    /// Show benchmark history
    #[command(name = "history")]
    History {
        /// Only show runs for this profile
        name: Option<String>,
    },
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}
