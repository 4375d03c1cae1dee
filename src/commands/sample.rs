//! Sample command implementation.
//!
//! Takes snapshots and shows what the watchdog would do, without sending any signal.

use std::time::Instant;

use memwatchdog::{build_snapshot, process::read_cmdline, ClockTicks, Decision, ProcFs, MIB};

use crate::config::Settings;

fn mib(bytes: u64) -> f64 {
    bytes as f64 / MIB as f64
}

/// Runs `iterations` dry-run ticks and lists the `top` largest processes of each.
pub fn command_sample(
    iterations: usize,
    top: usize,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 memwatchdog - Sample Mode");
    println!("============================");

    let source = ProcFs::new(&settings.proc_root);
    let ticks = ClockTicks::detect();

    for iteration in 1..=iterations {
        if iteration > 1 {
            std::thread::sleep(settings.interval);
        }
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        let start = Instant::now();
        let snapshot = build_snapshot(&source, ticks)?;
        println!(
            "   ⏱️  Scan duration: {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        println!(
            "   📊 {} processes ({} vanished, {} malformed, {} threads skipped)",
            snapshot.processes.len(),
            snapshot.stats.io_errors,
            snapshot.stats.structural_errors,
            snapshot.stats.threads
        );

        let decision = settings
            .thresholds
            .evaluate(&snapshot.processes, &snapshot.memory);
        if let Some(pressure) = decision.pressure() {
            println!(
                "   💾 Available: {:.1} / {:.1} MiB ({:.1}%)",
                mib(pressure.available),
                mib(pressure.total),
                pressure.percent_available()
            );
        }

        match &decision {
            Decision::Unmeasured => println!("   ❌ MemAvailable missing"),
            Decision::Healthy(_) => println!("   ✅ Above both floors, nothing to do"),
            Decision::NoCandidate(_) => {
                println!("   ⚠️  Below a floor but no candidate process")
            }
            Decision::Terminate { victim, .. } => {
                println!(
                    "   🎯 Would terminate {} (PID: {}), RSS={:.1} MiB",
                    victim.name,
                    victim.pid,
                    mib(victim.resident_memory)
                );
                if let Some(cmdline) = read_cmdline(&source, victim.pid) {
                    println!("      └─ {}", cmdline);
                }
            }
        }

        let mut largest: Vec<_> = snapshot.processes.iter().collect();
        largest.sort_by(|a, b| b.resident_memory.cmp(&a.resident_memory));
        if top > 0 && !largest.is_empty() {
            println!("   📈 Largest processes:");
            for process in largest.into_iter().take(top) {
                let private = process
                    .private_memory()
                    .map(|bytes| format!("{:.1} MiB", mib(bytes)))
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "      ├─ {:>7} {:<20} RSS={:>9.1} MiB  private={:>11}  cpu={:.2}s",
                    process.pid,
                    process.name,
                    mib(process.resident_memory),
                    private,
                    process.real_time().as_secs_f64()
                );
            }
        }
    }

    println!("\n✅ Sampling completed");
    Ok(())
}
