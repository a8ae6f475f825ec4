//! # cntryl-loadgen
//!
//! A continuous load generator: CPU workers count primes by trial division,
//! a memory worker commits a fraction of available RAM in fixed-size chunks,
//! and the same chunks are then cycled through a scratch file with
//! write/sync/read passes. Throughput is reported at a fixed cadence until
//! the run is drained.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cntryl_loadgen::{LoadConfig, LoadRunner};
//! use std::time::Duration;
//!
//! let config = LoadConfig::new()
//!     .memory_fraction(0.25)
//!     .report_interval(Duration::from_secs(2));
//!
//! let mut runner = LoadRunner::new(config);
//! runner.start()?;
//!
//! // ... wait for a shutdown request ...
//!
//! runner.drain();
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Modes
//!
//! - **aggregate** (default): CPU workers share one set of totals and a
//!   single `CPU: N total primes/sec` line is printed per report interval.
//! - **detailed**: every CPU worker prints its own status, and lifecycle
//!   lines are printed for each phase.

mod config;
mod report;
mod result;
mod runner;
mod signal;
pub mod sysmem;
pub mod workload;

pub use config::{resolve_cpu_workers, LoadConfig, MAX_MEMORY_FRACTION, MIN_MEMORY_FRACTION};
pub use report::{format_with_commas, ConsoleReporter, CpuProgress, DiskProgress, Reporter};
pub use result::{CpuStats, CpuTotals, RunningAverage, Sample};
pub use runner::{LoadRunner, Phase, DEFAULT_GRACE_PERIOD};
pub use signal::StopSignal;
pub use sysmem::{FixedMemory, MemoryProbe, SystemMemory, FALLBACK_AVAILABLE_BYTES};
