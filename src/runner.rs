//! The load runner: starts the workers and drains them on request.

use crate::config::LoadConfig;
use crate::report::{ConsoleReporter, Reporter};
use crate::result::CpuStats;
use crate::signal::StopSignal;
use crate::sysmem::{MemoryProbe, SystemMemory};
use crate::workload;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Default time workers get to notice a stop request.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Lifecycle of a [`LoadRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Runs CPU workers and the memory/disk worker until drained.
///
/// # Example
///
/// ```rust,no_run
/// use cntryl_loadgen::{LoadConfig, LoadRunner};
///
/// let mut runner = LoadRunner::new(LoadConfig::new().from_env());
/// runner.start()?;
/// std::thread::sleep(std::time::Duration::from_secs(30));
/// runner.drain();
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct LoadRunner {
    config: LoadConfig,
    cores: usize,
    phase: Phase,
    stop: StopSignal,
    grace_period: Duration,
    reporter: Arc<dyn Reporter>,
    probe: Arc<dyn MemoryProbe>,
    stats: Option<Arc<CpuStats>>,
    workers: Vec<JoinHandle<()>>,
}

impl LoadRunner {
    /// Create a runner printing to the console and probing system memory.
    pub fn new(config: LoadConfig) -> Self {
        let reporter = Arc::new(ConsoleReporter::new(config.detailed));
        Self {
            config,
            cores: num_cpus::get(),
            phase: Phase::Idle,
            stop: StopSignal::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            reporter,
            probe: Arc::new(SystemMemory),
            stats: None,
            workers: Vec::new(),
        }
    }

    /// Replace the reporter.
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the available-memory probe.
    pub fn memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Override the detected logical core count.
    pub fn cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    /// Set how long [`drain`](Self::drain) waits at most.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Configuration as resolved by [`start`](Self::start).
    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Handle to the signal every worker polls.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Shared CPU totals, present once CPU workers are running.
    pub fn cpu_stats(&self) -> Option<&CpuStats> {
        self.stats.as_deref()
    }

    /// Validate the config and launch the enabled workers.
    pub fn start(&mut self) -> Result<()> {
        if self.phase != Phase::Idle {
            bail!("runner already started");
        }
        self.config.validate()?;
        self.config = self.config.clone().resolve_workers(self.cores);
        self.reporter.run_start(&self.config, self.cores);

        let config = Arc::new(self.config.clone());

        if !config.disable_cpu {
            let stats = Arc::new(CpuStats::new(config.report_interval, config.cpu_workers));
            for id in 0..config.cpu_workers {
                let (config, stats, stop, reporter) = (
                    Arc::clone(&config),
                    Arc::clone(&stats),
                    self.stop.clone(),
                    Arc::clone(&self.reporter),
                );
                let handle = thread::Builder::new()
                    .name(format!("loadgen-cpu-{}", id))
                    .spawn(move || {
                        let iterations =
                            workload::cpu::run_cpu_worker(id, &config, &stats, &stop, reporter.as_ref());
                        debug!(worker = id, iterations, "CPU worker exited");
                    })
                    .with_context(|| format!("Failed to spawn CPU worker {}", id))?;
                self.workers.push(handle);
            }
            self.stats = Some(stats);
        }

        if !config.disable_disk {
            let (stop, reporter, probe) = (
                self.stop.clone(),
                Arc::clone(&self.reporter),
                Arc::clone(&self.probe),
            );
            let handle = thread::Builder::new()
                .name("loadgen-memdisk".to_string())
                .spawn(move || {
                    workload::run_memory_and_disk(&config, probe.as_ref(), &stop, reporter.as_ref());
                    debug!("memory/disk worker exited");
                })
                .context("Failed to spawn memory/disk worker")?;
            self.workers.push(handle);
        }

        self.phase = Phase::Running;
        debug!(workers = self.workers.len(), "runner started");
        Ok(())
    }

    /// Set the stop signal and give workers up to the grace period to exit.
    ///
    /// Returns early once every worker has exited, never later than the
    /// grace period. Returns how many workers were still busy. Calling it
    /// again after the first drain does nothing.
    pub fn drain(&mut self) -> usize {
        match self.phase {
            Phase::Running => {}
            Phase::Idle => {
                self.stop.stop();
                self.phase = Phase::Stopped;
                return 0;
            }
            Phase::Draining | Phase::Stopped => return 0,
        }

        self.phase = Phase::Draining;
        self.reporter.run_draining();
        self.stop.stop();
        debug!(grace = ?self.grace_period, "draining");

        let deadline = Instant::now() + self.grace_period;
        loop {
            if self.workers.iter().all(JoinHandle::is_finished) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(DRAIN_POLL.min(deadline - now));
        }

        let (finished, busy): (Vec<_>, Vec<_>) =
            self.workers.drain(..).partition(JoinHandle::is_finished);
        for handle in finished {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!("{} panicked", name);
            }
        }
        if !busy.is_empty() {
            debug!(busy = busy.len(), "workers still busy after grace period");
        }

        self.phase = Phase::Stopped;
        self.reporter.run_end();
        busy.len()
    }
}
