//! Parsers for `/proc/<pid>/status` and `/proc/<pid>/stat`.
//!
//! Everything in here works on text that has already been read. Reading the
//! files (and deciding what an I/O failure means) is left to
//! [`crate::process::snapshot`].

use std::time::Duration;

use crate::system::ClockTicks;

/// One live process, as seen by a single sampling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    /// Thread-group id, i.e. the process id shared by all its threads.
    pub pid: u32,
    pub parent_pid: u32,
    /// The `comm` field of the stat line (at most 15 bytes on Linux).
    pub name: String,
    pub user_time: Duration,
    pub system_time: Duration,
    /// VmRSS in bytes, shared pages included.
    pub resident_memory: u64,
    /// VmSize in bytes.
    pub virtual_memory: u64,
    /// RssFile + RssShmem in bytes, when the kernel reports both.
    pub shared_memory: Option<u64>,
}

impl ProcessRecord {
    /// Total CPU time (user + system).
    pub fn real_time(&self) -> Duration {
        self.user_time + self.system_time
    }

    /// Resident memory not shared with other processes.
    pub fn private_memory(&self) -> Option<u64> {
        self.shared_memory
            .map(|shared| self.resident_memory.saturating_sub(shared))
    }
}

/// Why a process could not be turned into a [`ProcessRecord`].
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The file could not be read, usually because the process just exited.
    #[error("failed to read /proc/{pid}/{file}: {source}")]
    Io {
        pid: u32,
        file: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The text does not have the expected shape.
    #[error("malformed {0}")]
    Structural(String),

    /// A valid record, but for a secondary thread rather than a process.
    #[error("pid {pid} is a thread of process {tgid}")]
    Thread { pid: u32, tgid: u32 },
}

fn structural(reason: impl Into<String>) -> RecordError {
    RecordError::Structural(reason.into())
}

/// Fields taken from `/proc/<pid>/status`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusFields {
    pub tgid: u32,
    pub ppid: u32,
    pub vm_size: u64,
    pub vm_rss: u64,
    pub rss_file: Option<u64>,
    pub rss_shmem: Option<u64>,
}

/// Fields taken from `/proc/<pid>/stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFields {
    pub pid: u32,
    pub name: String,
    pub state: char,
    pub parent_pid: u32,
    pub user_time: Duration,
    pub system_time: Duration,
}

/// Parses a `key: value` right-hand side such as `"   2048 kB"`.
///
/// Plain numbers pass through, a `kB` suffix multiplies by 1024, any other
/// suffix is rejected.
pub fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim();
    let (number, unit) = match value.split_once(' ') {
        Some((number, unit)) => (number, Some(unit.trim())),
        None => (value, None),
    };
    let n: u64 = number.parse().ok()?;
    match unit {
        None => Some(n),
        Some("kB") => n.checked_mul(1024),
        Some(_) => None,
    }
}

/// Parses `/proc/<pid>/status`.
///
/// Unknown keys, blank lines and lines whose value does not parse are
/// skipped. `Tgid` and `PPid` are mandatory; memory keys are absent for
/// kernel threads and default to zero.
pub fn parse_status(text: &str) -> Result<StatusFields, RecordError> {
    let mut fields = StatusFields::default();
    let mut tgid = None;
    let mut ppid = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some(value) = parse_size(value) else {
            continue;
        };
        match key.trim() {
            "Tgid" => tgid = u32::try_from(value).ok(),
            "PPid" => ppid = u32::try_from(value).ok(),
            "VmSize" => fields.vm_size = value,
            "VmRSS" => fields.vm_rss = value,
            "RssFile" => fields.rss_file = Some(value),
            "RssShmem" => fields.rss_shmem = Some(value),
            _ => {}
        }
    }

    fields.tgid = tgid.ok_or_else(|| structural("status: no Tgid"))?;
    fields.ppid = ppid.ok_or_else(|| structural("status: no PPid"))?;
    Ok(fields)
}

/// Splits a stat line into `(pid, name, rest)`.
///
/// The name is everything between the first `(` and the last `)`. Nothing
/// after the name can contain a parenthesis, so this is the outermost pair
/// even for names like `my (weird) proc` or `a)b`.
fn split_stat(line: &str) -> Option<(&str, &str, &str)> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if close < open {
        return None;
    }
    Some((&line[..open], &line[open + 1..close], &line[close + 1..]))
}

/// Returns the one-letter state code of a stat line.
pub fn process_state(text: &str) -> Option<char> {
    let (_, _, rest) = split_stat(text)?;
    let token = rest.split_ascii_whitespace().next()?;
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(state), None) if state.is_ascii_alphabetic() => Some(state),
        _ => None,
    }
}

// pid (comm) state ppid pgrp session tty_nr             1-7
// tpgid flags minflt cminflt majflt cmajflt             8-13
// utime stime cutime cstime priority nice              14-19
// num_threads itrealvalue starttime                     20-22
const FIELD_PPID: usize = 4;
const FIELD_UTIME: usize = 14;
const FIELD_STIME: usize = 15;
const FIELD_STARTTIME: usize = 22;

/// Boot-relative start time of a stat line, in clock ticks.
///
/// Together with the pid it identifies one process across pid reuse.
pub fn process_start_time(text: &str) -> Option<u64> {
    let (_, _, rest) = split_stat(text.trim_end())?;
    rest.split_ascii_whitespace()
        .nth(FIELD_STARTTIME - 3)?
        .parse()
        .ok()
}

/// Parses `/proc/<pid>/stat`, converting CPU ticks with `ticks`.
pub fn parse_stat(text: &str, ticks: ClockTicks) -> Result<StatFields, RecordError> {
    let line = text.trim_end();
    let (pid, name, rest) =
        split_stat(line).ok_or_else(|| structural("stat: no (name)"))?;

    let pid: u32 = pid
        .trim()
        .parse()
        .map_err(|_| structural(format!("stat: pid {:?}", pid.trim())))?;
    let state = process_state(line).ok_or_else(|| structural("stat: no state"))?;

    // rest[0] is the state (field 3)
    let rest: Vec<&str> = rest.split_ascii_whitespace().collect();
    let field = |position: usize| -> Result<u64, RecordError> {
        let raw = rest
            .get(position - 3)
            .ok_or_else(|| structural(format!("stat: {} fields", rest.len() + 2)))?;
        raw.parse()
            .map_err(|_| structural(format!("stat: field {} is {:?}", position, raw)))
    };

    let parent_pid = u32::try_from(field(FIELD_PPID)?)
        .map_err(|_| structural("stat: ppid out of range"))?;
    let user_time = ticks.to_duration(field(FIELD_UTIME)?);
    let system_time = ticks.to_duration(field(FIELD_STIME)?);

    Ok(StatFields {
        pid,
        name: name.to_string(),
        state,
        parent_pid,
        user_time,
        system_time,
    })
}

/// Builds a record for the enumerated `pid` from its status and stat text.
///
/// Status is checked first: an entry whose `Tgid` differs from `pid` is a
/// thread and yields [`RecordError::Thread`] without looking at the stat
/// line.
pub fn parse_record(
    pid: u32,
    status: &str,
    stat: &str,
    ticks: ClockTicks,
) -> Result<ProcessRecord, RecordError> {
    let status = parse_status(status)?;
    if status.tgid != pid {
        return Err(RecordError::Thread {
            pid,
            tgid: status.tgid,
        });
    }

    let stat = parse_stat(stat, ticks)?;

    let shared_memory = match (status.rss_file, status.rss_shmem) {
        (Some(file), Some(shmem)) => Some(file.saturating_add(shmem)),
        _ => None,
    };

    Ok(ProcessRecord {
        pid: status.tgid,
        parent_pid: stat.parent_pid,
        name: stat.name,
        user_time: stat.user_time,
        system_time: stat.system_time,
        resident_memory: status.vm_rss,
        virtual_memory: status.vm_size,
        shared_memory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tpostgres\n\
        Umask:\t0077\n\
        State:\tS (sleeping)\n\
        Tgid:\t1234\n\
        Ngid:\t0\n\
        Pid:\t1234\n\
        PPid:\t1\n\
        Uid:\t999\t999\t999\t999\n\
        VmPeak:\t  220000 kB\n\
        VmSize:\t  210000 kB\n\
        VmRSS:\t    2048 kB\n\
        RssAnon:\t    1024 kB\n\
        RssFile:\t     768 kB\n\
        RssShmem:\t     256 kB\n\
        Threads:\t1\n";

    const STAT: &str = "1234 (postgres) S 1 1234 1234 0 -1 4194304 100 0 0 0 1000 500 0 0 20 0 1 0 12345 12345678 1234 18446744073709551615 4194304 4238788 140736466511168 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0\n";

    fn ticks() -> ClockTicks {
        ClockTicks::new(100).unwrap()
    }

    // -------------------------------------------------------------------------
    // Tests for parse_size
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("\t    2048 kB"), Some(2_097_152));
        assert_eq!(parse_size("0 kB"), Some(0));
        assert_eq!(parse_size("  42  "), Some(42));
        assert_eq!(parse_size("1"), Some(1));
    }

    #[test]
    fn test_parse_size_invalid() {
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("kB"), None);
        assert_eq!(parse_size("12 MB"), None);
        assert_eq!(parse_size("-1 kB"), None);
        assert_eq!(parse_size("S (sleeping)"), None);
        assert_eq!(parse_size("999\t999\t999\t999"), None);
        assert_eq!(parse_size("18446744073709551615 kB"), None);
    }

    // -------------------------------------------------------------------------
    // Tests for parse_status
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_status() {
        let fields = parse_status(STATUS).unwrap();
        assert_eq!(fields.tgid, 1234);
        assert_eq!(fields.ppid, 1);
        assert_eq!(fields.vm_rss, 2048 * 1024);
        assert_eq!(fields.vm_size, 210_000 * 1024);
        assert_eq!(fields.rss_file, Some(768 * 1024));
        assert_eq!(fields.rss_shmem, Some(256 * 1024));
    }

    #[test]
    fn test_parse_status_kernel_thread_has_no_memory() {
        let fields = parse_status("Name:\tkworker/0:1\nTgid:\t17\nPid:\t17\nPPid:\t2\n").unwrap();
        assert_eq!(fields.tgid, 17);
        assert_eq!(fields.vm_rss, 0);
        assert_eq!(fields.vm_size, 0);
        assert_eq!(fields.rss_file, None);
    }

    #[test]
    fn test_parse_status_ignores_garbage_lines() {
        let text = "\n\nnot a key value line\nVmRSS: 12 parsecs\nTgid:\t5\n:\nPPid:\t0\n";
        let fields = parse_status(text).unwrap();
        assert_eq!(fields.tgid, 5);
        assert_eq!(fields.ppid, 0);
        assert_eq!(fields.vm_rss, 0);
    }

    #[test]
    fn test_parse_status_missing_identity() {
        assert!(matches!(
            parse_status("Name:\tx\nPPid:\t1\n"),
            Err(RecordError::Structural(_))
        ));
        assert!(matches!(
            parse_status("Name:\tx\nTgid:\t3\n"),
            Err(RecordError::Structural(_))
        ));
        assert!(matches!(parse_status(""), Err(RecordError::Structural(_))));
    }

    // -------------------------------------------------------------------------
    // Tests for parse_stat
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_stat() {
        let stat = parse_stat(STAT, ticks()).unwrap();
        assert_eq!(stat.pid, 1234);
        assert_eq!(stat.name, "postgres");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.parent_pid, 1);
        assert_eq!(stat.user_time, Duration::from_secs(10));
        assert_eq!(stat.system_time, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_stat_name_with_parentheses_and_spaces() {
        let line = "77 (my (weird) proc) R 42 77 77 0 -1 0 0 0 0 0 250 125 0 0 20 0 1 0 1 1 1";
        let stat = parse_stat(line, ticks()).unwrap();
        assert_eq!(stat.name, "my (weird) proc");
        assert_eq!(stat.state, 'R');
        assert_eq!(stat.parent_pid, 42);
        assert_eq!(stat.user_time, Duration::from_millis(2500));
        assert_eq!(stat.system_time, Duration::from_millis(1250));
    }

    #[test]
    fn test_process_start_time() {
        assert_eq!(process_start_time(STAT), Some(12345));
        let line = "77 (my (weird) proc) R 42 77 77 0 -1 0 0 0 0 0 250 125 0 0 20 0 1 0 987 1 1";
        assert_eq!(process_start_time(line), Some(987));
        assert_eq!(process_start_time("9 (short) S 1 2 3"), None);
    }

    #[test]
    fn test_parse_stat_unbalanced_name() {
        let line = "9 (a) b) S 3 9 9 0 -1 0 0 0 0 0 1 2 0 0 20 0 1 0";
        let stat = parse_stat(line, ticks()).unwrap();
        assert_eq!(stat.name, "a) b");
        assert_eq!(stat.parent_pid, 3);
    }

    #[test]
    fn test_parse_stat_truncated() {
        // Ends right before stime
        let line = "1234 (test) S 1 2 3 4 5 6 7 8 9 10 11";
        assert!(matches!(
            parse_stat(line, ticks()),
            Err(RecordError::Structural(_))
        ));
        assert!(matches!(
            parse_stat("1234 (test) S 1 2 3", ticks()),
            Err(RecordError::Structural(_))
        ));
    }

    #[test]
    fn test_parse_stat_structural_failures() {
        for line in [
            "",
            "garbage",
            "1234 test S 1",
            "x (test) S 1 2 3 4 5 6 7 8 9 10 11 12",
            "1234 (test) Sleeping 1 2 3 4 5 6 7 8 9 10 11 12",
            "1234 (test) S 1 2 3 4 5 6 7 8 9 10 -11 12",
            ") 1234 ( S",
        ] {
            assert!(
                matches!(parse_stat(line, ticks()), Err(RecordError::Structural(_))),
                "expected structural failure for {:?}",
                line
            );
        }
    }

    #[test]
    fn test_process_state() {
        assert_eq!(process_state(STAT), Some('S'));
        assert_eq!(process_state("5 (zombie (x)) Z 1 5"), Some('Z'));
        assert_eq!(process_state("5 (x)"), None);
    }

    // -------------------------------------------------------------------------
    // Tests for parse_record
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_record() {
        let record = parse_record(1234, STATUS, STAT, ticks()).unwrap();
        assert_eq!(record.pid, 1234);
        assert_eq!(record.parent_pid, 1);
        assert_eq!(record.name, "postgres");
        assert_eq!(record.resident_memory, 2_097_152);
        assert_eq!(record.virtual_memory, 210_000 * 1024);
        assert_eq!(record.shared_memory, Some(1024 * 1024));
        assert_eq!(record.private_memory(), Some(1024 * 1024));
        assert_eq!(record.real_time(), record.user_time + record.system_time);
        assert_eq!(record.real_time(), Duration::from_secs(15));
    }

    #[test]
    fn test_parse_record_thread() {
        // /proc/1240 read through the thread id of a worker thread of 1234
        let status = STATUS.replace("Pid:\t1234", "Pid:\t1240");
        match parse_record(1240, &status, STAT, ticks()) {
            Err(RecordError::Thread { pid, tgid }) => {
                assert_eq!(pid, 1240);
                assert_eq!(tgid, 1234);
            }
            other => panic!("expected thread record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_record_without_shared_breakdown() {
        let status = "Tgid:\t8\nPPid:\t1\nVmRSS:\t100 kB\n";
        let stat = "8 (old) S 1 8 8 0 -1 0 0 0 0 0 7 3 0 0";
        let record = parse_record(8, status, stat, ticks()).unwrap();
        assert_eq!(record.shared_memory, None);
        assert_eq!(record.private_memory(), None);
        assert_eq!(record.resident_memory, 102_400);
    }
}
