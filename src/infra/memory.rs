use std::fs;

const PAGE_SIZE: u64 = 4096;
const MB: f64 = 1024.0 * 1024.0;

/// Source of the current process memory usage in bytes.
pub trait MemoryProbe {
    fn current_usage(&self) -> u64;
}

/// Resident set size of this process, read from `/proc/self/statm`.
/// Reports 0 on platforms without procfs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemory;

impl MemoryProbe for ProcessMemory {
    fn current_usage(&self) -> u64 {
        fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|statm| {
                statm
                    .split_whitespace()
                    .nth(1)
                    .and_then(|pages| pages.parse::<u64>().ok())
            })
            .map_or(0, |pages| pages * PAGE_SIZE)
    }
}

/// Soft ceiling checked by the search loop.
pub struct MemoryBudget {
    probe: Box<dyn MemoryProbe>,
    limit_bytes: u64,
}

impl MemoryBudget {
    pub fn new(limit_mb: u64) -> Self {
        Self::with_probe(limit_mb, Box::new(ProcessMemory))
    }

    pub fn with_probe(limit_mb: u64, probe: Box<dyn MemoryProbe>) -> Self {
        Self {
            probe,
            limit_bytes: limit_mb.saturating_mul(1024 * 1024),
        }
    }

    pub fn usage_mb(&self) -> f64 {
        self.probe.current_usage() as f64 / MB
    }

    pub fn limit_mb(&self) -> f64 {
        self.limit_bytes as f64 / MB
    }

    pub fn exceeded(&self) -> bool {
        self.probe.current_usage() > self.limit_bytes
    }
}

impl std::fmt::Debug for MemoryBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBudget")
            .field("limit_bytes", &self.limit_bytes)
            .finish()
    }
}
