//! Configuration management for memwatchdog.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use memwatchdog::Thresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_INTERVAL_MS: u64 = 1666;
pub const DEFAULT_LIMIT_MB: f64 = 100.0;
pub const DEFAULT_LIMIT_PERCENT: f64 = 5.0;
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 5000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Watchdog configuration. `None` means "use the default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Sampling
    #[serde(alias = "interval-ms")]
    pub interval_ms: Option<u64>,
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,

    // Trigger floors
    #[serde(alias = "limit-mb")]
    pub limit_mb: Option<f64>,
    #[serde(alias = "limit-percent")]
    pub limit_percent: Option<f64>,

    // Termination
    #[serde(alias = "grace-period-ms")]
    pub grace_period_ms: Option<u64>,
    #[serde(alias = "poll-interval-ms")]
    pub poll_interval_ms: Option<u64>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_ms: Some(DEFAULT_INTERVAL_MS),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            limit_mb: Some(DEFAULT_LIMIT_MB),
            limit_percent: Some(DEFAULT_LIMIT_PERCENT),
            grace_period_ms: Some(DEFAULT_GRACE_PERIOD_MS),
            poll_interval_ms: Some(DEFAULT_POLL_INTERVAL_MS),
            log_level: Some("info".into()),
        }
    }
}

/// Typed view of a validated [`Config`], as consumed by the sampling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub interval: Duration,
    pub proc_root: PathBuf,
    pub thresholds: Thresholds,
    pub grace_period: Duration,
    pub poll_interval: Duration,
}

impl Settings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            interval: Duration::from_millis(cfg.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS)),
            proc_root: cfg
                .proc_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT)),
            thresholds: Thresholds::from_limits(
                cfg.limit_mb.unwrap_or(DEFAULT_LIMIT_MB),
                cfg.limit_percent.unwrap_or(DEFAULT_LIMIT_PERCENT),
            ),
            grace_period: Duration::from_millis(
                cfg.grace_period_ms.unwrap_or(DEFAULT_GRACE_PERIOD_MS),
            ),
            poll_interval: Duration::from_millis(
                cfg.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        }
    }
}

/// Parses a log level name the same way the CLI does.
pub fn parse_log_level(name: &str) -> Result<LogLevel, String> {
    LogLevel::from_str(name, true).map_err(|_| {
        format!(
            "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
            name
        )
    })
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    for (name, value) in [
        ("interval_ms", cfg.interval_ms),
        ("grace_period_ms", cfg.grace_period_ms),
        ("poll_interval_ms", cfg.poll_interval_ms),
    ] {
        if value == Some(0) {
            return Err(format!("{} must be greater than 0", name).into());
        }
    }

    if let Some(limit_mb) = cfg.limit_mb {
        if !limit_mb.is_finite() || limit_mb < 0.0 {
            return Err(format!("limit_mb must be a non-negative number, got {}", limit_mb).into());
        }
    }

    if let Some(limit_percent) = cfg.limit_percent {
        if !(0.0..=100.0).contains(&limit_percent) {
            return Err(format!(
                "limit_percent must be between 0 and 100, got {}",
                limit_percent
            )
            .into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        parse_log_level(level)?;
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(interval_ms) = args.interval_ms {
        config.interval_ms = Some(interval_ms);
    }
    if let Some(limit_mb) = args.limit_mb {
        config.limit_mb = Some(limit_mb);
    }
    if let Some(limit_percent) = args.limit_percent {
        config.limit_percent = Some(limit_percent);
    }
    if let Some(grace_period_ms) = args.grace_period_ms {
        config.grace_period_ms = Some(grace_period_ms);
    }
    if let Some(poll_interval_ms) = args.poll_interval_ms {
        config.poll_interval_ms = Some(poll_interval_ms);
    }
    if let Some(proc_root) = &args.proc_root {
        config.proc_root = Some(proc_root.clone());
    }

    // --debug raises the level to at least debug
    if let Some(level) = args.log_level {
        config.log_level = level.to_possible_value().map(|v| v.get_name().to_string());
    }
    if args.debug {
        let current = config
            .log_level
            .as_deref()
            .and_then(|l| parse_log_level(l).ok())
            .unwrap_or(LogLevel::Info);
        if current < LogLevel::Debug {
            config.log_level = Some("debug".into());
        }
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            // Try default locations
            let defaults = [
                "/etc/memwatchdog/memwatchdog.yaml",
                "/etc/memwatchdog/memwatchdog.yml",
                "/etc/memwatchdog/memwatchdog.json",
                "/etc/memwatchdog/memwatchdog.toml",
                "./memwatchdog.yaml",
                "./memwatchdog.yml",
                "./memwatchdog.json",
                "./memwatchdog.toml",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;

    let user: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)?,
    };
    info!("Loaded configuration from: {}", path.display());

    Ok(user.with_defaults())
}

impl Config {
    /// Fills every unset field from [`Config::default`].
    pub fn with_defaults(self) -> Self {
        let d = Config::default();
        Self {
            interval_ms: self.interval_ms.or(d.interval_ms),
            proc_root: self.proc_root.or(d.proc_root),
            limit_mb: self.limit_mb.or(d.limit_mb),
            limit_percent: self.limit_percent.or(d.limit_percent),
            grace_period_ms: self.grace_period_ms.or(d.grace_period_ms),
            poll_interval_ms: self.poll_interval_ms.or(d.poll_interval_ms),
            log_level: self.log_level.or(d.log_level),
        }
    }
}

/// Renders a configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
