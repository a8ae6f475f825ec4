//! Line-oriented reporters for load generator output.
//!
//! Every call produces whole lines, written under a lock, so reports from
//! different workers may interleave with each other but never mid-line.

use crate::config::LoadConfig;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Per-worker status in detailed mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuProgress {
    pub worker: usize,
    pub iterations: u64,
    /// Mean wall time of one primality pass.
    pub avg_latency: Duration,
    /// Rate of the most recent pass.
    pub primes_per_sec: f64,
}

/// Running disk throughput averages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskProgress {
    pub iterations: u64,
    pub avg_write_mib_per_sec: f64,
    pub avg_read_mib_per_sec: f64,
}

/// Sink for everything the workers and the runner report.
pub trait Reporter: Send + Sync {
    /// Called once the configuration is resolved and workers are about to start.
    fn run_start(&self, _config: &LoadConfig, _cores: usize) {}

    /// Called when a stop request begins the drain.
    fn run_draining(&self) {}

    /// Called after the grace period.
    fn run_end(&self) {}

    fn cpu_start(&self, _worker: usize) {}

    /// Aggregate-mode CPU rate, emitted at most once per interval.
    fn cpu_aggregate(&self, _primes_per_sec: f64) {}

    /// Detailed-mode CPU status for one worker.
    fn cpu_progress(&self, _progress: &CpuProgress) {}

    fn cpu_end(&self, _worker: usize, _iterations: u64) {}

    fn memory_start(&self, _target_bytes: u64) {}

    /// Allocation reached its target.
    fn memory_allocated(&self, _allocated_bytes: u64, _elapsed: Duration) {}

    /// A stop request arrived before the target was reached.
    fn memory_interrupted(&self, _allocated_bytes: u64) {}

    fn disk_start(&self, _dir: &Path) {}

    /// The disk phase had nothing to write.
    fn disk_no_chunks(&self) {}

    fn disk_progress(&self, _progress: &DiskProgress) {}

    fn disk_end(&self, _iterations: u64) {}
}

/// Reporter that prints human-readable lines to stdout.
///
/// Rate lines are always printed; lifecycle lines only in detailed mode.
pub struct ConsoleReporter {
    detailed: bool,
    output_lock: Mutex<()>,
}

impl ConsoleReporter {
    pub fn new(detailed: bool) -> Self {
        Self {
            detailed,
            output_lock: Mutex::new(()),
        }
    }

    fn write_stdout(&self, message: &str) {
        let _guard = self.output_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", message) {
            tracing::warn!("failed to write to stdout: {}", e);
        }
    }

    fn detail(&self, message: &str) {
        if self.detailed {
            self.write_stdout(message);
        }
    }
}

impl Reporter for ConsoleReporter {
    fn run_start(&self, config: &LoadConfig, cores: usize) {
        self.detail(&banner(config, cores));
    }

    fn run_draining(&self) {
        self.detail("\nReceived interrupt signal, shutting down...");
    }

    fn run_end(&self) {
        self.detail("Performance test completed");
    }

    fn cpu_start(&self, worker: usize) {
        self.detail(&format!("CPU Thread {}: Starting", worker));
    }

    fn cpu_aggregate(&self, primes_per_sec: f64) {
        self.write_stdout(&cpu_aggregate_line(primes_per_sec));
    }

    fn cpu_progress(&self, progress: &CpuProgress) {
        self.write_stdout(&cpu_progress_line(progress));
    }

    fn cpu_end(&self, worker: usize, iterations: u64) {
        self.detail(&format!(
            "CPU Thread {}: Completed {} iterations",
            worker, iterations
        ));
    }

    fn memory_start(&self, target_bytes: u64) {
        self.detail(&format!(
            "Memory: Starting allocation and filesystem benchmark\n\
             Memory: Target allocation: {} MB",
            target_bytes / MIB
        ));
    }

    fn memory_allocated(&self, allocated_bytes: u64, elapsed: Duration) {
        self.detail(&format!(
            "Memory: Allocated {} MB in {}",
            allocated_bytes / MIB,
            format_duration(elapsed)
        ));
    }

    fn memory_interrupted(&self, allocated_bytes: u64) {
        self.detail(&format!(
            "Memory: Stopping allocation at {} MB",
            allocated_bytes / MIB
        ));
    }

    fn disk_start(&self, dir: &Path) {
        self.detail(&format!(
            "Disk: Starting filesystem benchmark in path: {}",
            dir.display()
        ));
    }

    fn disk_no_chunks(&self) {
        self.write_stdout("Disk: No memory chunks available for filesystem test");
    }

    fn disk_progress(&self, progress: &DiskProgress) {
        self.write_stdout(&disk_progress_line(progress));
    }

    fn disk_end(&self, iterations: u64) {
        self.detail(&format!("Disk: Completed {} iterations", iterations));
    }
}

fn banner(config: &LoadConfig, cores: usize) -> String {
    format!(
        "CPU cores detected: {}\n\
         Using {} threads for CPU benchmarking\n\
         Prime range: {}\n\
         Memory allocation: {:.0}%\n\
         Chunk size: {} MB\n\
         Report interval: {} seconds",
        cores,
        config.cpu_workers,
        config.prime_range,
        config.memory_fraction * 100.0,
        config.chunk_size_mb,
        config.report_interval.as_secs()
    )
}

fn cpu_aggregate_line(primes_per_sec: f64) -> String {
    format!("CPU: {} total primes/sec", format_with_commas(primes_per_sec))
}

fn cpu_progress_line(p: &CpuProgress) -> String {
    format!(
        "CPU Thread {}: {} iterations, avg {:.2}ms/iter, {} primes/sec",
        p.worker,
        p.iterations,
        p.avg_latency.as_secs_f64() * 1000.0,
        format_with_commas(p.primes_per_sec)
    )
}

fn disk_progress_line(p: &DiskProgress) -> String {
    format!(
        "Disk: avg write {:.2} MB/s, avg read {:.2} MB/s",
        p.avg_write_mib_per_sec, p.avg_read_mib_per_sec
    )
}

/// Format a duration with consistent units: µs, ms, or s.
fn format_duration(d: Duration) -> String {
    if d.as_secs() > 0 {
        format!("{:.2}s", d.as_secs_f64())
    } else if d.as_millis() > 0 {
        format!("{:.2}ms", d.as_secs_f64() * 1000.0)
    } else {
        format!("{:.2}µs", d.as_secs_f64() * 1_000_000.0)
    }
}

/// Round to an integer and group digits in threes from the right.
///
/// `1234567.4` becomes `"1,234,567"`; values under 1000 get no separator.
pub fn format_with_commas(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    let rounded = format!("{:.0}", n);
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };

    let mut out = String::with_capacity(rounded.len() + digits.len() / 3);
    out.push_str(sign);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    /// Event captured by [`RecordingReporter`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        CpuStart(usize),
        CpuAggregate(f64),
        CpuProgress(CpuProgress),
        CpuEnd(usize, u64),
        MemoryStart(u64),
        MemoryAllocated(u64),
        MemoryInterrupted(u64),
        DiskStart,
        DiskNoChunks,
        DiskProgress(DiskProgress),
        DiskEnd(u64),
    }

    /// Reporter that keeps every event in memory.
    #[derive(Default)]
    pub struct RecordingReporter {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingReporter {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl Reporter for RecordingReporter {
        fn cpu_start(&self, worker: usize) {
            self.push(Event::CpuStart(worker));
        }
        fn cpu_aggregate(&self, rate: f64) {
            self.push(Event::CpuAggregate(rate));
        }
        fn cpu_progress(&self, progress: &CpuProgress) {
            self.push(Event::CpuProgress(*progress));
        }
        fn cpu_end(&self, worker: usize, iterations: u64) {
            self.push(Event::CpuEnd(worker, iterations));
        }
        fn memory_start(&self, target: u64) {
            self.push(Event::MemoryStart(target));
        }
        fn memory_allocated(&self, allocated: u64, _elapsed: Duration) {
            self.push(Event::MemoryAllocated(allocated));
        }
        fn memory_interrupted(&self, allocated: u64) {
            self.push(Event::MemoryInterrupted(allocated));
        }
        fn disk_start(&self, _dir: &Path) {
            self.push(Event::DiskStart);
        }
        fn disk_no_chunks(&self) {
            self.push(Event::DiskNoChunks);
        }
        fn disk_progress(&self, progress: &DiskProgress) {
            self.push(Event::DiskProgress(*progress));
        }
        fn disk_end(&self, iterations: u64) {
            self.push(Event::DiskEnd(iterations));
        }
    }
}
