//! One-shot cooperative stop signal shared by every worker loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Write-once stop flag.
///
/// Cloning yields another handle to the same flag. Setting never blocks on
/// readers and readers never block on the setter; once stopped, the flag
/// stays stopped.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Returns `true` only for the call that performed the
    /// transition; later calls are no-ops.
    pub fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    /// Non-blocking poll.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn should_start_unset() {
        assert!(!StopSignal::new().is_stopped());
    }

    #[test]
    fn should_report_transition_only_once() {
        let signal = StopSignal::new();
        assert!(signal.stop());
        assert!(!signal.stop());
        assert!(signal.is_stopped());
    }

    #[test]
    fn should_be_visible_through_clones() {
        let signal = StopSignal::new();
        let reader = signal.clone();
        signal.stop();
        assert!(reader.is_stopped());
    }

    #[test]
    fn should_reach_every_polling_thread() {
        let signal = StopSignal::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = signal.clone();
                thread::spawn(move || {
                    let mut polls = 0u64;
                    while !s.is_stopped() {
                        polls += 1;
                        thread::yield_now();
                    }
                    polls
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        let stopped_at = Instant::now();
        signal.stop();
        for h in handles {
            h.join().unwrap();
        }
        assert!(stopped_at.elapsed() < Duration::from_secs(2));
    }
}
