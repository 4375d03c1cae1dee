//! Sampling loop: snapshot, decide, terminate, sleep.

use memwatchdog::{
    build_snapshot, process::read_cmdline, ClockTicks, Decision, MemoryPressure, ProcFs,
    ProcSignaller, ProcSource, Signaller, Terminator, MIB,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Settings;

fn mib(bytes: u64) -> f64 {
    bytes as f64 / MIB as f64
}

/// Completes on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Runs ticks until a shutdown signal arrives or a snapshot cannot be taken.
pub async fn run(
    settings: &Settings,
    ticks: ClockTicks,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = Arc::new(ProcFs::new(&settings.proc_root));
    let terminator = Terminator::new(ProcSignaller::new(&settings.proc_root))
        .with_grace_period(settings.grace_period)
        .with_poll_interval(settings.poll_interval);

    let mut interval = tokio::time::interval(settings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            _ = interval.tick() => {
                if let Err(e) = step(&source, ticks, settings, &terminator).await {
                    error!("Sampling failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

fn log_pressure(pressure: &MemoryPressure) {
    debug!(
        "Available memory: {:.1} / {:.1} MiB = {:.1}%",
        mib(pressure.available),
        mib(pressure.total),
        pressure.percent_available()
    );
}

/// One sampling tick. Only snapshot failures are returned.
pub async fn step<S, G>(
    source: &Arc<S>,
    ticks: ClockTicks,
    settings: &Settings,
    terminator: &Terminator<G>,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: ProcSource + Send + Sync + 'static,
    G: Signaller,
{
    let started = Instant::now();
    let snapshot = {
        let source = Arc::clone(source);
        tokio::task::spawn_blocking(move || build_snapshot(&*source, ticks)).await??
    };
    debug!(
        "Snapshot: {} processes in {:.2}ms ({} vanished, {} malformed, {} threads)",
        snapshot.processes.len(),
        started.elapsed().as_secs_f64() * 1000.0,
        snapshot.stats.io_errors,
        snapshot.stats.structural_errors,
        snapshot.stats.threads
    );

    let decision = settings
        .thresholds
        .evaluate(&snapshot.processes, &snapshot.memory);
    if let Some(pressure) = decision.pressure() {
        log_pressure(&pressure);
    }

    match decision {
        Decision::Unmeasured => {
            warn!("MemAvailable (or MemFree) missing from meminfo, skipping tick");
        }
        Decision::Healthy(_) => {}
        Decision::NoCandidate(pressure) => {
            warn!(
                "Memory limit reached ({:.1} MiB available) but no process to terminate",
                mib(pressure.available)
            );
        }
        Decision::Terminate { victim, pressure } => {
            warn!(
                "Memory limit reached: {:.1} / {:.1} MiB available ({:.1}%)",
                mib(pressure.available),
                mib(pressure.total),
                pressure.percent_available()
            );
            let cmdline = read_cmdline(&**source, victim.pid).unwrap_or_default();
            warn!(
                "Terminating {} pid={} memory={:.0} MiB ({:.1}%) cmdline={:?}",
                victim.name,
                victim.pid,
                mib(victim.resident_memory),
                victim.resident_memory as f64 * 100.0 / pressure.total.max(1) as f64,
                cmdline
            );

            debug!("Grace period before SIGKILL: {:?}", terminator.grace_period());
            let kill_started = Instant::now();
            match terminator.terminate(victim.pid).await {
                Ok(outcome) => info!(
                    "pid {} terminated: {:?} after {:.2}s",
                    victim.pid,
                    outcome,
                    kill_started.elapsed().as_secs_f64()
                ),
                Err(e) => error!("Failed to terminate pid {}: {}", victim.pid, e),
            }
        }
    }

    Ok(())
}
