//! Configuration for the load generator.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest accepted memory fraction.
pub const MIN_MEMORY_FRACTION: f64 = 0.1;
/// Largest accepted memory fraction.
pub const MAX_MEMORY_FRACTION: f64 = 0.95;

const MIB: usize = 1024 * 1024;

/// Resolved configuration shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Exclusive upper bound of each primality pass.
    pub prime_range: u64,
    /// Fraction of available memory to allocate (0.1 to 0.95).
    pub memory_fraction: f64,
    /// Memory chunk and disk transfer size, in MiB.
    pub chunk_size_mb: usize,
    /// Time between periodic reports.
    #[serde(rename = "report_interval_secs", with = "secs_serde")]
    pub report_interval: Duration,
    /// CPU worker threads. Zero means logical cores minus one.
    pub cpu_workers: usize,
    /// Per-worker, per-phase output instead of one aggregate CPU line.
    pub detailed: bool,
    /// Skip the CPU workers.
    pub disable_cpu: bool,
    /// Skip the memory allocation and disk phase.
    pub disable_disk: bool,
    /// Directory for the disk scratch file.
    pub disk_path: PathBuf,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            prime_range: 10_000_000,
            memory_fraction: 0.9,
            chunk_size_mb: 100,
            report_interval: Duration::from_secs(5),
            cpu_workers: 0,
            detailed: false,
            disable_cpu: false,
            disable_disk: false,
            disk_path: std::env::temp_dir(),
        }
    }
}

impl LoadConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a JSON file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply overrides from environment variables.
    ///
    /// Supported variables:
    /// - `LOADGEN_PRIME_RANGE`: prime test upper bound
    /// - `LOADGEN_MEMORY_PERCENT`: memory fraction
    /// - `LOADGEN_CHUNK_SIZE`: chunk size in MiB
    /// - `LOADGEN_REPORT_INTERVAL`: report interval in seconds
    /// - `LOADGEN_CPU_THREADS`: CPU worker count (0 = auto)
    /// - `LOADGEN_FULL`: detailed output
    /// - `LOADGEN_DISABLE_CPU` / `LOADGEN_DISABLE_DISK`: skip a resource
    /// - `LOADGEN_DISK_PATH`: scratch directory
    ///
    /// Values that fail to parse are ignored.
    pub fn from_env(self) -> Self {
        self.apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(n) = lookup("LOADGEN_PRIME_RANGE").and_then(|v| v.parse().ok()) {
            self.prime_range = n;
        }
        if let Some(f) = lookup("LOADGEN_MEMORY_PERCENT").and_then(|v| v.parse().ok()) {
            self.memory_fraction = f;
        }
        if let Some(n) = lookup("LOADGEN_CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            self.chunk_size_mb = n;
        }
        if let Some(secs) = lookup("LOADGEN_REPORT_INTERVAL").and_then(|v| v.parse().ok()) {
            self.report_interval = Duration::from_secs(secs);
        }
        if let Some(n) = lookup("LOADGEN_CPU_THREADS").and_then(|v| v.parse().ok()) {
            self.cpu_workers = n;
        }
        if let Some(v) = lookup("LOADGEN_FULL") {
            self.detailed = parse_flag(&v);
        }
        if let Some(v) = lookup("LOADGEN_DISABLE_CPU") {
            self.disable_cpu = parse_flag(&v);
        }
        if let Some(v) = lookup("LOADGEN_DISABLE_DISK") {
            self.disable_disk = parse_flag(&v);
        }
        if let Some(v) = lookup("LOADGEN_DISK_PATH") {
            self.disk_path = PathBuf::from(v);
        }
        self
    }

    /// Set the primality pass upper bound.
    pub fn prime_range(mut self, n: u64) -> Self {
        self.prime_range = n;
        self
    }

    /// Set the memory fraction.
    pub fn memory_fraction(mut self, fraction: f64) -> Self {
        self.memory_fraction = fraction;
        self
    }

    /// Set the chunk size in MiB.
    pub fn chunk_size_mb(mut self, mb: usize) -> Self {
        self.chunk_size_mb = mb;
        self
    }

    /// Set the report interval.
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Set the CPU worker count (0 = auto).
    pub fn cpu_workers(mut self, n: usize) -> Self {
        self.cpu_workers = n;
        self
    }

    /// Enable detailed output.
    pub fn detailed(mut self, v: bool) -> Self {
        self.detailed = v;
        self
    }

    /// Disable the CPU workers.
    pub fn disable_cpu(mut self, v: bool) -> Self {
        self.disable_cpu = v;
        self
    }

    /// Disable the memory and disk phase.
    pub fn disable_disk(mut self, v: bool) -> Self {
        self.disable_disk = v;
        self
    }

    /// Set the scratch directory.
    pub fn disk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.disk_path = path.into();
        self
    }

    /// Chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_mb.saturating_mul(MIB)
    }

    /// Reject configurations no worker should start with.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_MEMORY_FRACTION..=MAX_MEMORY_FRACTION).contains(&self.memory_fraction) {
            bail!(
                "Memory percent must be between {} and {}",
                MIN_MEMORY_FRACTION,
                MAX_MEMORY_FRACTION
            );
        }
        if self.prime_range == 0 {
            bail!("Prime range must be positive");
        }
        if self.chunk_size_mb == 0 {
            bail!("Chunk size must be positive");
        }
        if self.report_interval.is_zero() {
            bail!("Report interval must be positive");
        }
        Ok(())
    }

    /// Replace an automatic worker count with the value for `cores`.
    pub fn resolve_workers(mut self, cores: usize) -> Self {
        self.cpu_workers = resolve_cpu_workers(self.cpu_workers, cores);
        self
    }
}

/// Resolve the CPU worker count: an explicit request wins, zero means
/// one worker per logical core minus one, never fewer than one.
pub fn resolve_cpu_workers(requested: usize, cores: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        cores.saturating_sub(1).max(1)
    }
}

fn parse_flag(v: &str) -> bool {
    v != "0" && !v.eq_ignore_ascii_case("false")
}

mod secs_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn should_use_reference_defaults() {
        let cfg = LoadConfig::default();
        assert_eq!(cfg.prime_range, 10_000_000);
        assert_eq!(cfg.memory_fraction, 0.9);
        assert_eq!(cfg.chunk_size_mb, 100);
        assert_eq!(cfg.report_interval, Duration::from_secs(5));
        assert_eq!(cfg.cpu_workers, 0);
        assert!(!cfg.detailed);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn should_accept_memory_fraction_when_within_bounds() {
        for f in [0.1, 0.5, 0.95] {
            let cfg = LoadConfig::new().memory_fraction(f);
            assert!(cfg.validate().is_ok(), "{f} should be accepted");
        }
    }

    #[test]
    fn should_reject_memory_fraction_when_out_of_bounds() {
        for f in [0.05, 0.0999, 0.96, 1.0, 1.5, -0.1, f64::NAN] {
            let cfg = LoadConfig::new().memory_fraction(f);
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("Memory percent"), "{f}: {err}");
        }
    }

    #[test]
    fn should_reject_zero_sizes() {
        assert!(LoadConfig::new().chunk_size_mb(0).validate().is_err());
        assert!(LoadConfig::new().prime_range(0).validate().is_err());
        assert!(LoadConfig::new()
            .report_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn should_resolve_workers_to_cores_minus_one_when_auto() {
        assert_eq!(resolve_cpu_workers(0, 8), 7);
        assert_eq!(resolve_cpu_workers(0, 2), 1);
        assert_eq!(resolve_cpu_workers(0, 1), 1);
        assert_eq!(resolve_cpu_workers(0, 0), 1);
    }

    #[test]
    fn should_keep_explicit_worker_count() {
        assert_eq!(resolve_cpu_workers(3, 16), 3);
        assert_eq!(LoadConfig::new().cpu_workers(5).resolve_workers(2).cpu_workers, 5);
    }

    #[test]
    fn should_apply_env_overrides_when_set() {
        let vars: HashMap<&str, &str> = [
            ("LOADGEN_PRIME_RANGE", "5000"),
            ("LOADGEN_MEMORY_PERCENT", "0.25"),
            ("LOADGEN_REPORT_INTERVAL", "2"),
            ("LOADGEN_FULL", "1"),
            ("LOADGEN_DISABLE_DISK", "false"),
            ("LOADGEN_CHUNK_SIZE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let cfg = LoadConfig::new().apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.prime_range, 5000);
        assert_eq!(cfg.memory_fraction, 0.25);
        assert_eq!(cfg.report_interval, Duration::from_secs(2));
        assert!(cfg.detailed);
        assert!(!cfg.disable_disk);
        assert_eq!(cfg.chunk_size_mb, 100);
    }

    #[test]
    fn should_load_partial_json_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loadgen.json");
        std::fs::write(&path, r#"{"chunk_size_mb": 8, "report_interval_secs": 1}"#).unwrap();

        let cfg = LoadConfig::load(&path).unwrap();
        assert_eq!(cfg.chunk_size_mb, 8);
        assert_eq!(cfg.report_interval, Duration::from_secs(1));
        assert_eq!(cfg.prime_range, 10_000_000);
    }

    #[test]
    fn should_fail_to_load_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LoadConfig::load(dir.path().join("absent.json")).is_err());
    }
}
