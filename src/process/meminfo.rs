//! Parsing of the global memory statistics in `/proc/meminfo`.

use ahash::AHashMap as HashMap;

use crate::process::record::parse_size;

pub const MEM_TOTAL: &str = "MemTotal";
pub const MEM_AVAILABLE: &str = "MemAvailable";
const MEM_FREE: &str = "MemFree";
const BUFFERS: &str = "Buffers";
const CACHED: &str = "Cached";

/// Every counter of one `/proc/meminfo` read, in bytes.
///
/// The map is open-ended: all parseable keys are kept and callers pick what
/// they need by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    values: HashMap<String, u64>,
}

impl MemoryInfo {
    pub fn get(&self, key: &str) -> Option<u64> {
        self.values.get(key).copied()
    }

    pub fn total(&self) -> Option<u64> {
        self.get(MEM_TOTAL)
    }

    /// `MemAvailable`, or `MemFree + Buffers + Cached` on kernels older than
    /// 3.14 that do not report it.
    pub fn available(&self) -> Option<u64> {
        self.get(MEM_AVAILABLE).or_else(|| {
            let free = self.get(MEM_FREE)?;
            let buffers = self.get(BUFFERS).unwrap_or(0);
            let cached = self.get(CACHED).unwrap_or(0);
            Some(free.saturating_add(buffers).saturating_add(cached))
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for MemoryInfo {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Parses `/proc/meminfo` text. Lines that do not parse are skipped; this
/// never fails.
pub fn parse_meminfo(text: &str) -> MemoryInfo {
    text.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key, parse_size(value)?))
        })
        .collect()
}
