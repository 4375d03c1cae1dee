//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("memwatchdog.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# memwatchdog Configuration
# ==========================
#
# Sampling
# --------
# interval_ms: 1666            # Time between two snapshots
# proc_root: "/proc"           # Process information filesystem
#
# Trigger Floors
# --------------
# The largest process is terminated when available memory drops below
# EITHER floor. Both comparisons are strict.
# limit_mb: 100.0              # Absolute floor in MiB
# limit_percent: 5.0           # Floor in percent of MemTotal (0-100)
#
# Termination
# -----------
# grace_period_ms: 5000        # Time after SIGTERM/SIGQUIT/SIGINT before SIGKILL
# poll_interval_ms: 50         # How often to check whether the victim exited
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}
