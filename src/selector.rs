//! Victim selection: decides whether memory is low and which process goes.
//!
//! Everything in here is a pure function of one snapshot, so the same input
//! always yields the same decision.

use crate::process::{MemoryInfo, ProcessRecord};

pub const MIB: u64 = 1 << 20;

/// Available and total memory of one tick, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPressure {
    pub available: u64,
    pub total: u64,
}

impl MemoryPressure {
    /// `None` when meminfo has no way to derive availability. A missing
    /// total reads as 0, which only disables the percent floor.
    pub fn from_info(info: &MemoryInfo) -> Option<Self> {
        Some(Self {
            available: info.available()?,
            total: info.total().unwrap_or(0),
        })
    }

    pub fn percent_available(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.available as f64 * 100.0 / self.total as f64
    }
}

/// Trigger floors. Crossing either one is enough.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_available_bytes: u64,
    /// Percent of total memory, `0.0..=100.0`.
    pub min_available_percent: f64,
}

/// Outcome of [`Thresholds::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision<'a> {
    /// Available memory could not be determined.
    Unmeasured,
    Healthy(MemoryPressure),
    /// Below a floor, but no process holds any resident memory.
    NoCandidate(MemoryPressure),
    Terminate {
        victim: &'a ProcessRecord,
        pressure: MemoryPressure,
    },
}

impl<'a> Decision<'a> {
    pub fn victim(&self) -> Option<&'a ProcessRecord> {
        match self {
            Decision::Terminate { victim, .. } => Some(*victim),
            _ => None,
        }
    }

    pub fn pressure(&self) -> Option<MemoryPressure> {
        match self {
            Decision::Unmeasured => None,
            Decision::Healthy(p) | Decision::NoCandidate(p) => Some(*p),
            Decision::Terminate { pressure, .. } => Some(*pressure),
        }
    }
}

impl Thresholds {
    /// Floors expressed as MiB and percent, the way they are configured.
    pub fn from_limits(limit_mib: f64, limit_percent: f64) -> Self {
        Self {
            min_available_bytes: (limit_mib * MIB as f64) as u64,
            min_available_percent: limit_percent,
        }
    }

    /// Strict comparison on both floors. The percent floor is not applied
    /// when the total is zero.
    pub fn is_triggered(&self, pressure: &MemoryPressure) -> bool {
        if pressure.available < self.min_available_bytes {
            return true;
        }
        let available = pressure.available as f64 * 100.0;
        let floor = self.min_available_percent * pressure.total as f64;
        pressure.total > 0 && available < floor
    }

    pub fn evaluate<'a>(
        &self,
        processes: &'a [ProcessRecord],
        memory: &MemoryInfo,
    ) -> Decision<'a> {
        let Some(pressure) = MemoryPressure::from_info(memory) else {
            return Decision::Unmeasured;
        };
        if !self.is_triggered(&pressure) {
            return Decision::Healthy(pressure);
        }
        match choose_victim(processes) {
            Some(victim) => Decision::Terminate { victim, pressure },
            None => Decision::NoCandidate(pressure),
        }
    }
}

/// The record with the strictly largest resident memory.
///
/// Ties go to the earliest record in `processes`. Records with zero resident
/// memory (kernel threads) are never chosen.
pub fn choose_victim(processes: &[ProcessRecord]) -> Option<&ProcessRecord> {
    let mut result: Option<&ProcessRecord> = None;
    for p in processes.iter().filter(|p| p.resident_memory > 0) {
        if result.map_or(true, |r| p.resident_memory > r.resident_memory) {
            result = Some(p);
        }
    }
    result
}
