//! Graceful-then-forced termination of a single process.
//!
//! The target gets SIGTERM, SIGQUIT and SIGINT back to back, then has
//! [`DEFAULT_GRACE_PERIOD`] to exit before SIGKILL is sent. Waiting for the
//! exit and the grace timer race in one `tokio::select!`; the loser is
//! dropped, so a late completion cannot change the outcome.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::process::{process_start_time, process_state};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sent in this order; different programs honour different ones.
pub const GRACEFUL_SIGNALS: [Signal; 3] = [Signal::SIGTERM, Signal::SIGQUIT, Signal::SIGINT];

/// How a termination attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The process was gone before the first signal.
    AlreadyGone,
    /// The process exited on its own within the grace period.
    Exited,
    /// The grace period expired and SIGKILL was delivered.
    Killed,
}

#[derive(Debug, thiserror::Error)]
pub enum TerminateError {
    #[error("pid {0} cannot be signalled")]
    InvalidPid(u32),

    #[error("failed to send {signal:?} to pid {pid}: {source}")]
    SignalDenied {
        pid: u32,
        signal: Signal,
        #[source]
        source: Errno,
    },
}

/// Delivers signals and observes process exit.
pub trait Signaller: Send + Sync {
    /// Called once per termination attempt, before the first signal.
    fn watch(&self, _pid: Pid) {}

    fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()>;

    /// True once the process is gone or a zombie.
    fn has_exited(&self, pid: Pid) -> bool;
}

/// [`Signaller`] backed by `kill(2)` and the state field of `/proc/<pid>/stat`.
///
/// The victim is not our child, so `waitpid` is not an option; a zombie
/// counts as exited because its memory is already released.
///
/// The start time of the watched pid is remembered. If the pid shows up with
/// a different start time, the victim is gone and the number was reused: the
/// new process is reported as exited and never signalled. A pid recycled
/// between the stat read and `kill(2)` itself cannot be detected this way.
#[derive(Debug)]
pub struct ProcSignaller {
    proc_root: PathBuf,
    watched: Mutex<Option<(Pid, u64)>>,
}

impl ProcSignaller {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            watched: Mutex::new(None),
        }
    }

    fn read_stat(&self, pid: Pid) -> std::io::Result<String> {
        let raw = fs::read(self.proc_root.join(pid.to_string()).join("stat"))?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    fn start_time(&self, pid: Pid) -> Option<u64> {
        process_start_time(&self.read_stat(pid).ok()?)
    }

    /// True when `pid` now belongs to a different process than the watched one.
    fn is_replaced(&self, pid: Pid) -> bool {
        let watched = match self.watched.lock() {
            Ok(guard) => *guard,
            Err(_) => return false,
        };
        match watched {
            Some((watched_pid, started)) if watched_pid == pid => self
                .start_time(pid)
                .map_or(false, |current| current != started),
            _ => false,
        }
    }
}

impl Default for ProcSignaller {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl Signaller for ProcSignaller {
    fn watch(&self, pid: Pid) {
        let started = self.start_time(pid);
        if let Ok(mut guard) = self.watched.lock() {
            *guard = started.map(|started| (pid, started));
        }
    }

    fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()> {
        if self.is_replaced(pid) {
            debug!("pid {} was reused, not sending {:?}", pid, signal);
            return Err(Errno::ESRCH);
        }
        kill(pid, signal)
    }

    fn has_exited(&self, pid: Pid) -> bool {
        if self.is_replaced(pid) {
            return true;
        }
        match self.read_stat(pid) {
            Ok(stat) => matches!(process_state(&stat), Some('Z' | 'X' | 'x')),
            // hidepid or a foreign proc root: fall back to a null signal
            Err(_) => kill(pid, None) == Err(Errno::ESRCH),
        }
    }
}

/// Runs one termination attempt per [`Terminator::terminate`] call.
#[derive(Debug, Clone)]
pub struct Terminator<S> {
    signaller: S,
    grace_period: Duration,
    poll_interval: Duration,
}

impl<S: Signaller> Terminator<S> {
    pub fn new(signaller: S) -> Self {
        Self {
            signaller,
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn signaller(&self) -> &S {
        &self.signaller
    }

    /// Terminates `pid`, escalating to SIGKILL after the grace period.
    ///
    /// A process that is already gone is a success. Any other signal failure
    /// is returned as is; there is no retry.
    pub async fn terminate(&self, pid: u32) -> Result<Outcome, TerminateError> {
        let target = i32::try_from(pid)
            .ok()
            .filter(|&raw| raw > 0)
            .map(Pid::from_raw)
            .ok_or(TerminateError::InvalidPid(pid))?;

        self.signaller.watch(target);
        for (index, signal) in GRACEFUL_SIGNALS.into_iter().enumerate() {
            match self.signaller.signal(target, signal) {
                Ok(()) => debug!("Sent {:?} to pid {}", signal, pid),
                Err(Errno::ESRCH) if index == 0 => {
                    debug!("pid {} no longer exists", pid);
                    return Ok(Outcome::AlreadyGone);
                }
                Err(Errno::ESRCH) => {
                    debug!("pid {} exited during the signal sequence", pid);
                    return Ok(Outcome::Exited);
                }
                Err(source) => {
                    return Err(TerminateError::SignalDenied {
                        pid,
                        signal,
                        source,
                    });
                }
            }
        }

        tokio::select! {
            biased;
            _ = self.wait_for_exit(target) => Ok(Outcome::Exited),
            _ = tokio::time::sleep(self.grace_period) => self.force_kill(target, pid),
        }
    }

    async fn wait_for_exit(&self, target: Pid) {
        while !self.signaller.has_exited(target) {
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn force_kill(&self, target: Pid, pid: u32) -> Result<Outcome, TerminateError> {
        warn!(
            "pid {} still alive after {:?}, sending SIGKILL",
            pid, self.grace_period
        );
        match self.signaller.signal(target, Signal::SIGKILL) {
            Ok(()) => Ok(Outcome::Killed),
            Err(Errno::ESRCH) => Ok(Outcome::Exited),
            Err(source) => Err(TerminateError::SignalDenied {
                pid,
                signal: Signal::SIGKILL,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graceful_signal_order() {
        assert_eq!(
            GRACEFUL_SIGNALS,
            [Signal::SIGTERM, Signal::SIGQUIT, Signal::SIGINT]
        );
    }

    fn write_stat(root: &std::path::Path, pid: i32, state: &str, start_time: u64) {
        let pid_dir = root.join(pid.to_string());
        std::fs::create_dir_all(&pid_dir).expect("Failed to create pid dir");
        std::fs::write(
            pid_dir.join("stat"),
            format!(
                "{} (worker) {} 1 1 1 0 -1 0 0 0 0 0 1 1 0 0 20 0 1 0 {} 1000 10",
                pid, state, start_time
            ),
        )
        .expect("Failed to write stat file");
    }

    #[test]
    fn test_proc_signaller_reads_zombie_state() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_stat(dir.path(), 100, "S", 500);
        write_stat(dir.path(), 101, "Z", 500);

        let signaller = ProcSignaller::new(dir.path());
        assert!(!signaller.has_exited(Pid::from_raw(100)));
        assert!(signaller.has_exited(Pid::from_raw(101)));
    }

    #[test]
    fn test_reused_pid_counts_as_exited_and_is_not_signalled() {
        // Far above any pid_max, so a real kill(2) would fail with ESRCH too
        let pid = Pid::from_raw(i32::MAX - 7);
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_stat(dir.path(), pid.as_raw(), "S", 500);

        let signaller = ProcSignaller::new(dir.path());
        signaller.watch(pid);
        assert!(!signaller.has_exited(pid));

        // Same pid, different start time: another process took the number
        write_stat(dir.path(), pid.as_raw(), "R", 900);
        assert!(signaller.has_exited(pid));
        assert_eq!(signaller.signal(pid, Signal::SIGKILL), Err(Errno::ESRCH));

        // Watching again adopts the new process
        signaller.watch(pid);
        assert!(!signaller.has_exited(pid));
    }
}
