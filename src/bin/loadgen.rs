//! loadgen: continuous CPU, memory and disk load with periodic throughput
//! reports.
//!
//! Runs until interrupted (Ctrl+C or SIGTERM), then gives every worker a
//! short grace period to finish its current pass before exiting.
//!
//! Configuration is layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. `--config <file.json>`
//! 3. `LOADGEN_*` environment variables
//! 4. command-line flags

use anyhow::{Context, Result};
use clap::Parser;
use cntryl_loadgen::{LoadConfig, LoadRunner};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "loadgen",
    version,
    about = "Continuously stress CPU, memory and disk and report throughput",
    long_about = "
loadgen keeps every resource busy until it is interrupted:

  - CPU: one thread per core (minus one) counting primes by trial division
  - Memory: a fraction of available RAM committed in fixed-size chunks
  - Disk: those chunks written to a scratch file, synced and read back

Example:
    loadgen                              # Aggregate output, all resources
    loadgen --full --report-interval 2   # Per-thread and per-phase output
    loadgen --disable-disk --cpu-threads 4
    loadgen --memory-percent 0.5 --disk-path /mnt/scratch
"
)]
struct Cli {
    // ========================================================================
    // Workload
    // ========================================================================
    /// Range for prime number testing (default: 10M)
    #[arg(long)]
    prime_range: Option<u64>,

    /// Fraction of available memory to allocate (0.1-0.95, default: 0.9)
    #[arg(long, allow_negative_numbers = true)]
    memory_percent: Option<f64>,

    /// Memory chunk size in MB (default: 100)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Seconds between benchmark reports (default: 5)
    #[arg(long)]
    report_interval: Option<u64>,

    /// Number of CPU threads (0 = auto: cores-1)
    #[arg(long)]
    cpu_threads: Option<usize>,

    /// Disable CPU testing
    #[arg(long)]
    disable_cpu: bool,

    /// Disable memory and disk testing
    #[arg(long)]
    disable_disk: bool,

    /// Directory for the disk benchmark file (default: system temp dir)
    #[arg(long)]
    disk_path: Option<PathBuf>,

    /// JSON file with configuration values
    #[arg(long)]
    config: Option<PathBuf>,

    // ========================================================================
    // Output Control
    // ========================================================================
    /// Show full output with per-thread and per-phase detail
    #[arg(long)]
    full: bool,

    /// Verbose diagnostics on stderr
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Only errors on stderr
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Layer defaults, config file, environment and flags.
    fn resolve_config(&self) -> Result<LoadConfig> {
        let mut config = match &self.config {
            Some(path) => LoadConfig::load(path)?,
            None => LoadConfig::default(),
        }
        .from_env();

        if let Some(n) = self.prime_range {
            config.prime_range = n;
        }
        if let Some(f) = self.memory_percent {
            config.memory_fraction = f;
        }
        if let Some(mb) = self.chunk_size {
            config.chunk_size_mb = mb;
        }
        if let Some(secs) = self.report_interval {
            config.report_interval = Duration::from_secs(secs);
        }
        if let Some(n) = self.cpu_threads {
            config.cpu_workers = n;
        }
        if let Some(dir) = &self.disk_path {
            config.disk_path = dir.clone();
        }
        config.detailed |= self.full;
        config.disable_cpu |= self.disable_cpu;
        config.disable_disk |= self.disable_disk;

        Ok(config)
    }
}

// ============================================================================
// Verbosity Control
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn from_args(cli: &Cli) -> Self {
        if cli.quiet {
            Verbosity::Quiet
        } else if cli.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn default_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "debug",
        }
    }
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the verbosity flags.
fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(Verbosity::from_args(&cli));

    let config = cli.resolve_config()?;
    config.validate()?;
    debug!(?config, "resolved configuration");

    // One channel carries both SIGINT and SIGTERM.
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .context("Failed to install signal handler")?;

    let mut runner = LoadRunner::new(config);
    runner.start()?;

    // Only the first notification matters; later ones find the runner stopped.
    let _ = shutdown_rx.recv();
    let busy = runner.drain();
    if busy > 0 {
        debug!(busy, "exiting with workers mid-pass");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn should_pass_clap_self_check() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_override_defaults_with_flags() {
        let cli = Cli::parse_from([
            "loadgen",
            "--prime-range",
            "5000",
            "--memory-percent",
            "0.3",
            "--cpu-threads",
            "2",
            "--full",
            "--disable-disk",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.prime_range, 5000);
        assert_eq!(config.memory_fraction, 0.3);
        assert_eq!(config.cpu_workers, 2);
        assert!(config.detailed);
        assert!(config.disable_disk);
        assert!(!config.disable_cpu);
    }

    #[test]
    fn should_accept_negative_fraction_for_validation_to_reject() {
        let cli = Cli::parse_from(["loadgen", "--memory-percent", "-0.1"]);
        let config = cli.resolve_config().unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_pick_verbosity_from_flags() {
        let cli = Cli::parse_from(["loadgen", "-v"]);
        assert_eq!(Verbosity::from_args(&cli), Verbosity::Verbose);
        let cli = Cli::parse_from(["loadgen", "-q"]);
        assert_eq!(Verbosity::from_args(&cli).default_filter(), "error");
        assert!(Cli::try_parse_from(["loadgen", "-q", "-v"]).is_err());
    }
}
