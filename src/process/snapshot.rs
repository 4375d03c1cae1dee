//! Process discovery and assembly of one sampling snapshot.
//!
//! [`ProcSource`] is the seam between the parsers and the operating system:
//! [`ProcFs`] reads a real (or fixture) `/proc` tree, tests may provide their
//! own implementation.

use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::process::meminfo::{parse_meminfo, MemoryInfo};
use crate::process::record::{parse_record, ProcessRecord, RecordError};
use crate::system::ClockTicks;

/// Raw access to process information.
pub trait ProcSource: Sync {
    /// Candidate process ids. Failing here makes the whole snapshot fail.
    fn pids(&self) -> io::Result<Vec<u32>>;
    fn status(&self, pid: u32) -> io::Result<Vec<u8>>;
    fn stat(&self, pid: u32) -> io::Result<Vec<u8>>;
    fn cmdline(&self, pid: u32) -> io::Result<Vec<u8>>;
    fn meminfo(&self) -> io::Result<Vec<u8>>;
}

/// A `/proc`-style directory tree.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pid_file(&self, pid: u32, file: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(file)
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcSource for ProcFs {
    /// Numeric-named directories under the root, in ascending order.
    fn pids(&self) -> io::Result<Vec<u32>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)?.flatten() {
            // Entries can vanish while we iterate
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(v) => v,
                None => continue,
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if let Ok(pid) = name.parse::<u32>() {
                out.push(pid);
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    fn status(&self, pid: u32) -> io::Result<Vec<u8>> {
        fs::read(self.pid_file(pid, "status"))
    }

    fn stat(&self, pid: u32) -> io::Result<Vec<u8>> {
        fs::read(self.pid_file(pid, "stat"))
    }

    fn cmdline(&self, pid: u32) -> io::Result<Vec<u8>> {
        fs::read(self.pid_file(pid, "cmdline"))
    }

    fn meminfo(&self) -> io::Result<Vec<u8>> {
        fs::read(self.root.join("meminfo"))
    }
}

/// Fatal snapshot failures. Per-process problems never end up here.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to enumerate processes: {0}")]
    Enumerate(#[source] io::Error),

    #[error("failed to read memory statistics: {0}")]
    MemInfo(#[source] io::Error),
}

/// How many candidates were dropped, and why.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotStats {
    pub candidates: usize,
    pub io_errors: usize,
    pub structural_errors: usize,
    pub threads: usize,
}

/// Processes and memory counters of one sampling tick.
///
/// `processes` follows the ascending pid order of the enumeration. Callers
/// other than the victim tie-break should not depend on that.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub processes: Vec<ProcessRecord>,
    pub memory: MemoryInfo,
    pub stats: SnapshotStats,
}

/// Reads and parses one process.
pub fn read_record<S: ProcSource + ?Sized>(
    source: &S,
    pid: u32,
    ticks: ClockTicks,
) -> Result<ProcessRecord, RecordError> {
    let status = source.status(pid).map_err(|e| RecordError::Io {
        pid,
        file: "status",
        source: e,
    })?;
    let stat = source.stat(pid).map_err(|e| RecordError::Io {
        pid,
        file: "stat",
        source: e,
    })?;

    parse_record(
        pid,
        &String::from_utf8_lossy(&status),
        &String::from_utf8_lossy(&stat),
        ticks,
    )
}

/// Command line with NUL separators turned into spaces.
///
/// `None` when unreadable or empty (kernel threads, zombies).
pub fn read_cmdline<S: ProcSource + ?Sized>(source: &S, pid: u32) -> Option<String> {
    let raw = source.cmdline(pid).ok()?;
    let parts: Vec<String> = raw
        .split(|&b| b == 0u8)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Enumerates every process of `source` and reads the memory counters.
///
/// Processes that exit between enumeration and read, thread entries and
/// malformed records are dropped; only enumeration and meminfo failures are
/// returned.
pub fn build_snapshot<S: ProcSource + ?Sized>(
    source: &S,
    ticks: ClockTicks,
) -> Result<Snapshot, SnapshotError> {
    let pids = source.pids().map_err(SnapshotError::Enumerate)?;
    debug!("Collected {} process entries", pids.len());

    let io_errors = AtomicUsize::new(0);
    let structural_errors = AtomicUsize::new(0);
    let threads = AtomicUsize::new(0);

    let processes: Vec<ProcessRecord> = pids
        .par_iter()
        .filter_map(|&pid| match read_record(source, pid, ticks) {
            Ok(record) => Some(record),
            Err(RecordError::Io { .. }) => {
                io_errors.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(RecordError::Thread { .. }) => {
                threads.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e @ RecordError::Structural(_)) => {
                debug!("Skipping process {}: {}", pid, e);
                structural_errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        })
        .collect();

    let memory = source
        .meminfo()
        .map(|raw| parse_meminfo(&String::from_utf8_lossy(&raw)))
        .map_err(SnapshotError::MemInfo)?;

    let stats = SnapshotStats {
        candidates: pids.len(),
        io_errors: io_errors.into_inner(),
        structural_errors: structural_errors.into_inner(),
        threads: threads.into_inner(),
    };

    Ok(Snapshot {
        processes,
        memory,
        stats,
    })
}
