//! Host facts that are resolved once at startup and passed down explicitly.

use std::fmt;
use std::time::Duration;

/// Process-accounting clock frequency (`_SC_CLK_TCK`).
///
/// CPU times in `/proc/<pid>/stat` are counted in these ticks. The value is
/// looked up once by the caller and handed to every parse call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTicks(u64);

impl ClockTicks {
    /// Common Linux default, used when `sysconf` gives nothing usable.
    pub const DEFAULT: ClockTicks = ClockTicks(100);

    /// Returns `None` for a zero frequency.
    pub fn new(per_second: u64) -> Option<Self> {
        (per_second > 0).then_some(Self(per_second))
    }

    /// Get system clock ticks per second (usually 100, but can vary).
    pub fn detect() -> Self {
        #[cfg(unix)]
        {
            // SAFETY: sysconf is safe to call with _SC_CLK_TCK
            // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
            let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
            if tck > 0 {
                return Self(tck as u64);
            }
        }
        Self::DEFAULT
    }

    pub fn per_second(self) -> u64 {
        self.0
    }

    /// Converts a tick count to wall-clock time with microsecond resolution.
    pub fn to_duration(self, ticks: u64) -> Duration {
        Duration::from_micros(ticks.saturating_mul(1_000_000) / self.0)
    }
}

impl Default for ClockTicks {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ClockTicks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_frequency_rejected() {
        assert_eq!(ClockTicks::new(0), None);
        assert_eq!(ClockTicks::new(250).map(ClockTicks::per_second), Some(250));
    }

    #[test]
    fn test_to_duration() {
        let ticks = ClockTicks::new(100).unwrap();
        assert_eq!(ticks.to_duration(0), Duration::ZERO);
        assert_eq!(ticks.to_duration(150), Duration::from_millis(1500));

        // 1 tick at 3 Hz truncates to whole microseconds
        let odd = ClockTicks::new(3).unwrap();
        assert_eq!(odd.to_duration(1), Duration::from_micros(333_333));
    }

    #[test]
    fn test_detect_is_positive() {
        assert!(ClockTicks::detect().per_second() > 0);
    }
}
