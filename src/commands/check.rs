//! Check command implementation.
//!
//! Validates system requirements and configuration.

use memwatchdog::{
    build_snapshot, process::read_record, ClockTicks, ProcFs, ProcSource, RecordError,
};

use crate::config::{validate_effective_config, Config, Settings};

/// Validates system requirements and configuration.
pub fn command_check(
    config: &Config,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 memwatchdog - System Check");
    println!("=============================");

    let mut all_ok = true;
    let source = ProcFs::new(&settings.proc_root);
    let ticks = ClockTicks::detect();

    println!("\n📁 Checking {}...", settings.proc_root.display());
    match source.pids() {
        Ok(pids) if pids.is_empty() => {
            println!("   ❌ No process entries found");
            all_ok = false;
        }
        Ok(pids) => println!("   ✅ Can list {} process entries", pids.len()),
        Err(e) => {
            println!("   ❌ Cannot enumerate processes: {}", e);
            all_ok = false;
        }
    }

    // Our own entry must always parse
    let own_pid = std::process::id();
    match read_record(&source, own_pid, ticks) {
        Ok(record) => println!(
            "   ✅ Own record parsed: {} (PID: {}), RSS={}MB",
            record.name,
            record.pid,
            record.resident_memory / 1024 / 1024
        ),
        Err(RecordError::Io { .. }) if settings.proc_root != std::path::Path::new("/proc") => {
            println!("   ⚠️  PID {} not present under a custom root", own_pid)
        }
        Err(e) => {
            println!("   ❌ Cannot parse own record: {}", e);
            all_ok = false;
        }
    }

    println!("\n💾 Checking memory counters...");
    match build_snapshot(&source, ticks) {
        Ok(snapshot) => {
            match (snapshot.memory.total(), snapshot.memory.available()) {
                (Some(total), Some(available)) => println!(
                    "   ✅ Available {}MB of {}MB ({} counters)",
                    available / 1024 / 1024,
                    total / 1024 / 1024,
                    snapshot.memory.len()
                ),
                _ => {
                    println!("   ❌ MemTotal or MemAvailable missing");
                    all_ok = false;
                }
            }
            println!(
                "   ✅ Snapshot: {} processes ({} vanished, {} malformed, {} threads skipped)",
                snapshot.processes.len(),
                snapshot.stats.io_errors,
                snapshot.stats.structural_errors,
                snapshot.stats.threads
            );
        }
        Err(e) => {
            println!("   ❌ Snapshot failed: {}", e);
            all_ok = false;
        }
    }
    println!("   ✅ Clock ticks: {}", ticks);

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    if !nix::unistd::geteuid().is_root() {
        println!("   ⚠️  Not running as root - other users' processes cannot be signalled");
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
