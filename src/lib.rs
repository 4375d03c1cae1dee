//! memwatchdog library
//!
//! Building blocks of a host-local memory-pressure watchdog for Linux. The
//! binary wires them into a sampling loop; the library keeps them free of any
//! scheduling so they can be driven from tests or other tools.
//!
//! # Pieces
//!
//! - [`process`]: parses `/proc/<pid>/status`, `/proc/<pid>/stat` and
//!   `/proc/meminfo` into a [`Snapshot`] of live processes
//! - [`selector`]: decides whether memory is low and which process to sacrifice
//! - [`terminate`]: SIGTERM/SIGQUIT/SIGINT, then SIGKILL after a grace period
//! - [`system`]: host facts resolved once at startup (clock ticks)
//!
//! # Usage
//!
//! ```rust,no_run
//! use memwatchdog::{build_snapshot, ClockTicks, Decision, ProcFs, Thresholds};
//!
//! let ticks = ClockTicks::detect();
//! let snapshot = build_snapshot(&ProcFs::default(), ticks).expect("/proc is readable");
//!
//! let thresholds = Thresholds::from_limits(100.0, 5.0);
//! match thresholds.evaluate(&snapshot.processes, &snapshot.memory) {
//!     Decision::Terminate { victim, .. } => println!("would terminate {}", victim.pid),
//!     other => println!("no action: {:?}", other),
//! }
//! ```

pub mod process;
pub mod selector;
pub mod system;
pub mod terminate;

// Re-export main types for convenience
pub use process::{
    build_snapshot, parse_meminfo, parse_record, MemoryInfo, ProcFs, ProcSource, ProcessRecord,
    RecordError, Snapshot, SnapshotError,
};
pub use selector::{choose_victim, Decision, MemoryPressure, Thresholds, MIB};
pub use system::ClockTicks;
pub use terminate::{Outcome, ProcSignaller, Signaller, TerminateError, Terminator};
