//! Available-memory probes.

use anyhow::Result;
use tracing::{debug, warn};

/// Reported when the platform query fails or yields nothing usable.
pub const FALLBACK_AVAILABLE_BYTES: u64 = 8 * 1024 * 1024 * 1024;

const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Source of the "memory available for allocation" figure.
///
/// Implementations never return zero.
pub trait MemoryProbe: Send + Sync {
    fn available_bytes(&self) -> u64;
}

/// Probe backed by the operating system.
///
/// Linux reads `/proc/meminfo`, macOS parses `vm_stat`; every other
/// platform, and any failure, yields [`FALLBACK_AVAILABLE_BYTES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    fn available_bytes(&self) -> u64 {
        match query_available() {
            Ok(Some(bytes)) => {
                debug!(bytes, "found available memory");
                bytes
            }
            Ok(None) => {
                warn!("failed to find available memory, using 8GB");
                FALLBACK_AVAILABLE_BYTES
            }
            Err(e) => {
                warn!("{:#}; using 8GB", e);
                FALLBACK_AVAILABLE_BYTES
            }
        }
    }
}

/// Probe that always reports the same size.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub u64);

impl MemoryProbe for FixedMemory {
    fn available_bytes(&self) -> u64 {
        if self.0 == 0 {
            FALLBACK_AVAILABLE_BYTES
        } else {
            self.0
        }
    }
}

#[cfg(target_os = "linux")]
fn query_available() -> Result<Option<u64>> {
    use anyhow::Context;

    let text =
        std::fs::read_to_string("/proc/meminfo").context("Error reading /proc/meminfo")?;
    Ok(parse_meminfo(&text))
}

#[cfg(target_os = "macos")]
fn query_available() -> Result<Option<u64>> {
    use anyhow::{bail, Context};

    let output = std::process::Command::new("vm_stat")
        .output()
        .context("Error running vm_stat")?;
    if !output.status.success() {
        bail!("vm_stat exited with {}", output.status);
    }
    Ok(parse_vm_stat(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn query_available() -> Result<Option<u64>> {
    anyhow::bail!("Unsupported OS for memory query")
}

/// Extract available bytes from `/proc/meminfo` text.
///
/// Uses `MemAvailable` when present and non-zero, otherwise
/// `MemFree + Buffers + Cached`.
pub fn parse_meminfo(text: &str) -> Option<u64> {
    let field = |name: &str| -> Option<u64> {
        text.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
            Some(kb * 1024)
        })
    };

    let available = match field("MemAvailable") {
        Some(bytes) if bytes > 0 => bytes,
        _ => {
            field("MemFree").unwrap_or(0)
                + field("Buffers").unwrap_or(0)
                + field("Cached").unwrap_or(0)
        }
    };
    (available > 0).then_some(available)
}

/// Extract available bytes (free plus inactive pages) from `vm_stat` output.
pub fn parse_vm_stat(text: &str) -> Option<u64> {
    let page_size = text
        .lines()
        .filter(|line| line.contains("page size of"))
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            fields.find(|f| *f == "of")?;
            fields.next()?.parse::<u64>().ok()
        })
        .unwrap_or(DEFAULT_PAGE_SIZE);

    let pages = |prefix: &str| -> u64 {
        text.lines()
            .filter(|line| line.starts_with(prefix))
            .find_map(|line| {
                line.split_whitespace()
                    .last()?
                    .trim_end_matches('.')
                    .parse()
                    .ok()
            })
            .unwrap_or(0)
    };

    let available = (pages("Pages free:") + pages("Pages inactive:")) * page_size;
    (available > 0).then_some(available)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       32737236 kB
MemFree:         1203944 kB
MemAvailable:   20481212 kB
Buffers:          512000 kB
Cached:         17000000 kB
SwapCached:            0 kB
";

    const VM_STAT: &str = "\
Mach Virtual Memory Statistics: (page size of 16384 bytes)
Pages free:                               12345.
Pages active:                            400000.
Pages inactive:                          100000.
Pages speculative:                         5000.
";

    #[test]
    fn should_prefer_mem_available() {
        assert_eq!(parse_meminfo(MEMINFO), Some(20481212 * 1024));
    }

    #[test]
    fn should_sum_free_buffers_cached_when_available_missing() {
        let text = MEMINFO.replace("MemAvailable:   20481212 kB\n", "");
        assert_eq!(
            parse_meminfo(&text),
            Some((1203944 + 512000 + 17000000) * 1024)
        );
    }

    #[test]
    fn should_sum_fallback_fields_when_available_zero() {
        let text = MEMINFO.replace("20481212", "0");
        assert_eq!(
            parse_meminfo(&text),
            Some((1203944 + 512000 + 17000000) * 1024)
        );
    }

    #[test]
    fn should_return_none_when_meminfo_empty() {
        assert_eq!(parse_meminfo(""), None);
        assert_eq!(parse_meminfo("garbage line\n"), None);
    }

    #[test]
    fn should_use_reported_page_size() {
        assert_eq!(parse_vm_stat(VM_STAT), Some((12345 + 100000) * 16384));
    }

    #[test]
    fn should_default_page_size_when_missing() {
        let text = "Pages free: 10.\nPages inactive: 6.\n";
        assert_eq!(parse_vm_stat(text), Some(16 * 4096));
    }

    #[test]
    fn should_return_none_when_vm_stat_has_no_pages() {
        assert_eq!(parse_vm_stat("Mach Virtual Memory Statistics\n"), None);
    }

    #[test]
    fn should_never_report_zero() {
        assert!(SystemMemory.available_bytes() > 0);
        assert_eq!(FixedMemory(0).available_bytes(), FALLBACK_AVAILABLE_BYTES);
        assert_eq!(FixedMemory(42).available_bytes(), 42);
    }
}
