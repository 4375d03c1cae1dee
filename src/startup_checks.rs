//! Startup requirement validation for memwatchdog.
//!
//! This module validates that the watchdog can read process information and
//! signal the processes it may select before the sampling loop starts.

use memwatchdog::{ClockTicks, ProcFs, ProcSource};
use nix::unistd::geteuid;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Validate all runtime requirements
pub fn validate_requirements(proc_root: &Path) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_proc_access(proc_root)?;
    check_clock_ticks();

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Without root, kill(2) fails with EPERM for other users' processes.
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - only processes of the current user can be terminated");
        warn!("   Recommendation: Run as root (or with CAP_KILL) for system-wide protection");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

/// Check that processes can be enumerated and memory counters read
fn check_proc_access(proc_root: &Path) -> Result<(), ValidationError> {
    let source = ProcFs::new(proc_root);

    match source.pids() {
        Ok(pids) if pids.is_empty() => {
            error!("❌ No process entries found under {}", proc_root.display());
            return Err(ValidationError::ProcUnavailable(format!(
                "no numeric entries under {}",
                proc_root.display()
            )));
        }
        Ok(pids) => info!("✅ {} process entries visible", pids.len()),
        Err(e) => {
            error!("❌ Cannot enumerate {}: {}", proc_root.display(), e);
            return Err(ValidationError::ProcUnavailable(e.to_string()));
        }
    }

    match source.meminfo() {
        Ok(_) => {
            info!("✅ {}/meminfo readable", source.root().display());
            Ok(())
        }
        Err(e) => {
            error!("❌ Cannot read {}/meminfo: {}", proc_root.display(), e);
            Err(ValidationError::MemInfoUnavailable(e.to_string()))
        }
    }
}

fn check_clock_ticks() {
    let ticks = ClockTicks::detect();
    if ticks.per_second() != ClockTicks::DEFAULT.per_second() {
        warn!("⚠️  Unusual clock tick rate: {}", ticks);
    } else {
        debug!("Clock ticks per second: {}", ticks.per_second());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Process information unavailable: {0}")]
    ProcUnavailable(String),

    #[error("Memory statistics unavailable: {0}")]
    MemInfoUnavailable(String),
}
