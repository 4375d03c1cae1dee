//! Process-related modules for turning /proc text into typed records.
//!
//! This module provides:
//! - `record`: per-process parsing of `/proc/<pid>/status` and `/proc/<pid>/stat`
//! - `meminfo`: parsing of `/proc/meminfo`
//! - `snapshot`: process discovery and assembly of one sampling snapshot

pub mod meminfo;
pub mod record;
pub mod snapshot;

// Re-export commonly used types
pub use meminfo::{parse_meminfo, MemoryInfo};
pub use record::{
    parse_record, parse_size, parse_stat, parse_status, process_start_time, process_state,
    ProcessRecord, RecordError, StatFields, StatusFields,
};
pub use snapshot::{
    build_snapshot, read_cmdline, read_record, ProcFs, ProcSource, Snapshot, SnapshotError,
    SnapshotStats,
};
