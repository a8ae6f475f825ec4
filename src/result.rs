//! Throughput samples and the shared CPU aggregate.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const MIB: f64 = 1024.0 * 1024.0;

/// Result of one measured pass of a workload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Wall time of the pass.
    pub duration: Duration,
    /// Bytes processed (for throughput calculation)
    pub bytes: Option<u64>,
    /// Elements/operations processed
    pub elements: Option<u64>,
}

impl Sample {
    /// A pass that processed `bytes` bytes.
    pub fn bytes(duration: Duration, bytes: u64) -> Self {
        Self {
            duration,
            bytes: Some(bytes),
            elements: None,
        }
    }

    /// A pass that counted `elements` items.
    pub fn elements(duration: Duration, elements: u64) -> Self {
        Self {
            duration,
            bytes: None,
            elements: Some(elements),
        }
    }

    /// Calculate bytes per second throughput.
    pub fn bytes_per_sec(&self) -> Option<f64> {
        self.bytes.map(|b| b as f64 / self.duration.as_secs_f64())
    }

    /// Calculate MiB per second throughput.
    pub fn mib_per_sec(&self) -> Option<f64> {
        self.bytes_per_sec().map(|bps| bps / MIB)
    }

    /// Calculate elements per second throughput.
    pub fn elements_per_sec(&self) -> Option<f64> {
        self.elements
            .map(|e| e as f64 / self.duration.as_secs_f64())
    }
}

/// Loop-local mean of per-iteration rates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    sum: f64,
    count: u64,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of everything added so far, zero when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Point-in-time copy of the CPU totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTotals {
    pub primes: u64,
    pub busy: Duration,
}

#[derive(Debug)]
struct CpuState {
    primes: u64,
    busy: Duration,
    last_report: Instant,
}

/// Totals shared by every CPU worker in aggregate mode.
///
/// All three fields are updated under one lock, and the report decision is
/// made while the lock is held, so each interval is reported at most once
/// no matter how many workers finish a pass around the same time.
#[derive(Debug)]
pub struct CpuStats {
    state: Mutex<CpuState>,
    interval: Duration,
    workers: usize,
}

impl CpuStats {
    pub fn new(interval: Duration, workers: usize) -> Self {
        Self {
            state: Mutex::new(CpuState {
                primes: 0,
                busy: Duration::ZERO,
                last_report: Instant::now(),
            }),
            interval,
            workers,
        }
    }

    /// Fold one pass into the totals. Returns the estimated aggregate rate
    /// when this call is the one that closes the current report interval.
    pub fn record(&self, primes: u64, duration: Duration) -> Option<f64> {
        self.record_at(primes, duration, Instant::now())
    }

    pub(crate) fn record_at(&self, primes: u64, duration: Duration, now: Instant) -> Option<f64> {
        // The totals stay meaningful even if a holder panicked.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.primes += primes;
        state.busy += duration;

        if now.saturating_duration_since(state.last_report) < self.interval {
            return None;
        }

        // Average single-worker rate scaled by the worker count.
        let per_worker = state.primes as f64 / state.busy.as_secs_f64();
        state.last_report = now;
        Some(per_worker * self.workers as f64)
    }

    pub fn totals(&self) -> CpuTotals {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        CpuTotals {
            primes: state.primes,
            busy: state.busy,
        }
    }
}
