//! Memory usage probes.
//!
//! A probe returning `None` means the metric is unavailable on this platform,
//! which is reported as such rather than treated as an error.

/// Source of a "bytes in use" reading.
pub trait MemoryProbe {
    fn used_bytes(&self) -> Option<u64>;
}

/// Resident set size of the current process.
///
/// Read from `/proc/self/status` on Linux, unavailable elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    #[cfg(target_os = "linux")]
    fn used_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }

    #[cfg(not(target_os = "linux"))]
    fn used_bytes(&self) -> Option<u64> {
        None
    }
}

/// Probe for platforms without any memory metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn used_bytes(&self) -> Option<u64> {
        None
    }
}

/// Extract `VmRSS` (reported in kB) as bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// Convert bytes to mebibytes.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
