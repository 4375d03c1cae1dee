//! memwatchdog - version 0.1.0
//!
//! Low-memory watchdog with tracing logging.
//! This is the main entry point that starts the sampling loop and handles subcommands.

mod cli;
mod commands;
mod config;
mod startup_checks;
mod watchdog;

use clap::Parser;
use memwatchdog::ClockTicks;
use tracing::{error, info, level_filters::LevelFilter};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_sample};
use config::{
    parse_log_level, resolve_config, show_config, validate_effective_config, Config, Settings,
};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level = config
        .log_level
        .as_deref()
        .and_then(|name| parse_log_level(name).ok())
        .unwrap_or(LogLevel::Info);

    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, &args.config_format);
    }

    if let Some(command) = &args.command {
        // Config generation doesn't depend on the effective config
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), format.clone(), *commented);
        }

        let config = load_validated_config(&args)?;
        let settings = Settings::from_config(&config);

        return match command {
            Commands::Check => command_check(&config, &settings),

            Commands::Sample { iterations, top } => command_sample(*iterations, *top, &settings),

            Commands::CheckRequirements => {
                setup_logging(&config);
                println!("🔍 Checking Runtime Requirements");
                println!("================================\n");

                match startup_checks::validate_requirements(&settings.proc_root) {
                    Ok(_) => {
                        println!("\n✅ All requirements met - ready for production!");
                        std::process::exit(0);
                    }
                    Err(e) => {
                        eprintln!("\n❌ Requirements check failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }

            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config);

    info!("Starting memwatchdog");

    let settings = Settings::from_config(&config);

    if let Err(e) = startup_checks::validate_requirements(&settings.proc_root) {
        error!("❌ Startup validation failed: {}", e);
        error!("   The watchdog will start but may not function correctly!");
    }

    let ticks = ClockTicks::detect();
    info!(
        "Watching {} every {:?}: trigger below {:.1} MiB or {:.1}% available, grace period {:?}",
        settings.proc_root.display(),
        settings.interval,
        settings.thresholds.min_available_bytes as f64 / memwatchdog::MIB as f64,
        settings.thresholds.min_available_percent,
        settings.grace_period
    );

    watchdog::run(&settings, ticks).await?;

    info!("memwatchdog stopped gracefully");
    Ok(())
}
