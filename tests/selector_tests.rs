//! Integration tests for the victim selection policy.

use memwatchdog::{Decision, MemoryInfo, MemoryPressure, ProcessRecord, Thresholds, MIB};
use std::time::Duration;

fn record(pid: u32, resident_mib: u64) -> ProcessRecord {
    ProcessRecord {
        pid,
        parent_pid: 1,
        name: format!("proc{}", pid),
        user_time: Duration::from_secs(1),
        system_time: Duration::ZERO,
        resident_memory: resident_mib * MIB,
        virtual_memory: resident_mib * MIB * 3,
        shared_memory: None,
    }
}

fn meminfo(available_mib: u64, total_mib: u64) -> MemoryInfo {
    [
        ("MemAvailable", available_mib * MIB),
        ("MemTotal", total_mib * MIB),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_end_to_end_scenario() {
    let processes = vec![record(100, 50), record(200, 120)];
    let memory = meminfo(80, 2000);
    let thresholds = Thresholds::from_limits(100.0, 5.0);

    match thresholds.evaluate(&processes, &memory) {
        Decision::Terminate { victim, pressure } => {
            assert_eq!(victim.pid, 200);
            assert_eq!(pressure.available, 80 * MIB);
            assert_eq!(pressure.total, 2000 * MIB);
        }
        other => panic!("expected a victim, got {:?}", other),
    }
}

#[test]
fn test_healthy_memory_selects_nothing() {
    let processes = vec![record(100, 50), record(200, 120)];
    let thresholds = Thresholds::from_limits(100.0, 5.0);

    let decision = thresholds.evaluate(&processes, &meminfo(500, 2000));
    assert_eq!(
        decision,
        Decision::Healthy(MemoryPressure {
            available: 500 * MIB,
            total: 2000 * MIB,
        })
    );
    assert!(decision.victim().is_none());
}

#[test]
fn test_percent_floor_alone_triggers() {
    let processes = vec![record(1, 10)];
    // 150 MiB is above the absolute floor but below 10% of 2000 MiB
    let thresholds = Thresholds::from_limits(100.0, 10.0);
    let decision = thresholds.evaluate(&processes, &meminfo(150, 2000));
    assert_eq!(decision.victim().map(|p| p.pid), Some(1));
}

#[test]
fn test_percent_floor_boundary_is_strict() {
    let processes = vec![record(1, 10)];
    let thresholds = Thresholds::from_limits(0.0, 5.0);

    // exactly 5%
    assert!(thresholds
        .evaluate(&processes, &meminfo(100, 2000))
        .victim()
        .is_none());

    let mut memory: MemoryInfo = [("MemAvailable", 100 * MIB - 1), ("MemTotal", 2000 * MIB)]
        .into_iter()
        .collect();
    assert!(thresholds.evaluate(&processes, &memory).victim().is_some());

    memory = meminfo(101, 2000);
    assert!(thresholds.evaluate(&processes, &memory).victim().is_none());
}

#[test]
fn test_absolute_floor_boundary_is_strict() {
    let processes = vec![record(1, 10)];
    let thresholds = Thresholds::from_limits(100.0, 0.0);

    assert!(thresholds
        .evaluate(&processes, &meminfo(100, 2000))
        .victim()
        .is_none());

    let memory: MemoryInfo = [("MemAvailable", 100 * MIB - 1), ("MemTotal", 2000 * MIB)]
        .into_iter()
        .collect();
    assert!(thresholds.evaluate(&processes, &memory).victim().is_some());
}

#[test]
fn test_empty_process_list_yields_no_victim() {
    let thresholds = Thresholds::from_limits(100.0, 5.0);
    for memory in [meminfo(0, 2000), meminfo(10, 2000), meminfo(80, 100)] {
        let decision = thresholds.evaluate(&[], &memory);
        assert!(matches!(decision, Decision::NoCandidate(_)));
        assert!(decision.victim().is_none());
    }
}

#[test]
fn test_missing_counters_are_unmeasured() {
    let processes = vec![record(1, 10)];
    let thresholds = Thresholds::from_limits(100.0, 5.0);

    assert_eq!(
        thresholds.evaluate(&processes, &MemoryInfo::default()),
        Decision::Unmeasured
    );
    let only_total: MemoryInfo = [("MemTotal", 2000 * MIB)].into_iter().collect();
    assert_eq!(
        thresholds.evaluate(&processes, &only_total),
        Decision::Unmeasured
    );
}

#[test]
fn test_absolute_floor_applies_without_total() {
    let processes = vec![record(100, 50), record(200, 120)];
    let thresholds = Thresholds::from_limits(100.0, 5.0);

    let only_available: MemoryInfo = [("MemAvailable", 10 * MIB)].into_iter().collect();
    let decision = thresholds.evaluate(&processes, &only_available);
    assert_eq!(decision.victim().map(|p| p.pid), Some(200));
    assert_eq!(decision.pressure().map(|p| p.total), Some(0));

    // Above the absolute floor, the percent floor cannot fire without a total
    let plenty: MemoryInfo = [("MemAvailable", 500 * MIB)].into_iter().collect();
    assert!(matches!(
        thresholds.evaluate(&processes, &plenty),
        Decision::Healthy(_)
    ));
}

#[test]
fn test_selection_is_deterministic() {
    let processes = vec![record(7, 64), record(3, 64), record(9, 32)];
    let memory = meminfo(10, 2000);
    let thresholds = Thresholds::from_limits(100.0, 5.0);

    let first = thresholds.evaluate(&processes, &memory);
    let second = thresholds.evaluate(&processes, &memory);
    assert_eq!(first, second);
    assert_eq!(first.victim().map(|p| p.pid), Some(7));
}
