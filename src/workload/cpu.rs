//! CPU worker loop.

use crate::config::LoadConfig;
use crate::report::{CpuProgress, Reporter};
use crate::result::{CpuStats, Sample};
use crate::signal::StopSignal;
use crate::workload::prime::count_primes;
use std::time::{Duration, Instant};

/// Run primality passes until `stop` is set; returns the number of passes.
///
/// The stop signal is polled between passes only, so a pass in flight
/// always runs to completion. In aggregate mode each pass is folded into
/// `stats`; in detailed mode the worker keeps its own totals and reports
/// them under its `id`.
pub fn run_cpu_worker(
    id: usize,
    config: &LoadConfig,
    stats: &CpuStats,
    stop: &StopSignal,
    reporter: &dyn Reporter,
) -> u64 {
    reporter.cpu_start(id);

    let mut iterations = 0u64;
    let mut busy = Duration::ZERO;
    let mut last_report = Instant::now();

    while !stop.is_stopped() {
        let start = Instant::now();
        let primes = count_primes(config.prime_range);
        let sample = Sample::elements(start.elapsed(), primes);
        iterations += 1;
        busy += sample.duration;

        if config.detailed {
            if last_report.elapsed() >= config.report_interval {
                reporter.cpu_progress(&CpuProgress {
                    worker: id,
                    iterations,
                    avg_latency: busy.div_f64(iterations as f64),
                    primes_per_sec: sample.elements_per_sec().unwrap_or_default(),
                });
                last_report = Instant::now();
            }
        } else if let Some(rate) = stats.record(primes, sample.duration) {
            reporter.cpu_aggregate(rate);
        }
    }

    reporter.cpu_end(id, iterations);
    iterations
}
