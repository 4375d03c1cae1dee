//! CLI arguments and subcommands for memwatchdog.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "memwatchdog",
    about = "Terminates the largest process when available memory runs low",
    long_about = "Terminates the largest process when available memory runs low.\n\n\
                  Samples /proc/meminfo and every /proc/<pid> on a fixed interval. When \
                  available memory drops below an absolute or percentage floor, the process \
                  with the largest resident memory receives SIGTERM, SIGQUIT and SIGINT, and \
                  SIGKILL if it is still alive after the grace period.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Sampling interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Trigger when available memory drops below this many MiB
    #[arg(long)]
    pub limit_mb: Option<f64>,

    /// Trigger when available memory drops below this percent of total
    #[arg(long)]
    pub limit_percent: Option<f64>,

    /// Time a victim gets to exit before SIGKILL, in milliseconds
    #[arg(long)]
    pub grace_period_ms: Option<u64>,

    /// How often to check whether the victim has exited, in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Root of the process information filesystem
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Log level (overrides config file, default: info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Log available memory on every tick
    #[arg(long)]
    pub debug: bool,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and /proc access
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Take snapshots and print the decision without terminating anything
    Sample {
        /// Number of snapshots
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Number of largest processes to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}
