//! Progress reporting service
//!
//! The scheduler reports once per completed batch; frontends decide how to
//! show it.

use instant::Instant;
use std::sync::Mutex;

/// Receiver of per-batch progress
pub trait BatchProgress: Send + Sync {
    /// Called after each batch with the number of jobs finished so far
    ///
    /// # Arguments
    /// * `processed` - Jobs whose outcome is known, including degraded and failed
    /// * `total` - Jobs in the run
    fn on_batch_complete(&self, processed: usize, total: usize);
}

impl<F> BatchProgress for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_batch_complete(&self, processed: usize, total: usize) {
        self(processed, total);
    }
}

/// Progress receiver that discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressReporter;

impl BatchProgress for NoOpProgressReporter {
    fn on_batch_complete(&self, _processed: usize, _total: usize) {}
}

/// Rate and ETA derived from the updates seen so far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub elapsed_ms: u64,
    /// Jobs per second, zero until the first batch finishes
    pub items_per_second: f64,
    pub eta_seconds: Option<u64>,
}

impl ProgressSnapshot {
    fn compute(processed: usize, total: usize, elapsed_ms: u64) -> Self {
        let seconds = elapsed_ms as f64 / 1000.0;
        let items_per_second = if seconds > 0.0 {
            processed as f64 / seconds
        } else {
            0.0
        };
        let remaining = total.saturating_sub(processed);
        let eta_seconds = (items_per_second > 0.0)
            .then(|| (remaining as f64 / items_per_second).ceil() as u64);
        Self {
            processed,
            total,
            elapsed_ms,
            items_per_second,
            eta_seconds,
        }
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed.min(self.total) * 100) / self.total) as u8
    }
}

/// Logs one line per batch through the `log` facade
#[derive(Debug)]
pub struct ConsoleProgressReporter {
    verbose: bool,
    start_time: Instant,
    last: Mutex<Option<ProgressSnapshot>>,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to include rate and ETA
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            start_time: Instant::now(),
            last: Mutex::new(None),
        }
    }

    /// Most recent snapshot, if any batch has completed
    #[must_use]
    pub fn last_snapshot(&self) -> Option<ProgressSnapshot> {
        *self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn format_eta(eta_seconds: Option<u64>) -> String {
        match eta_seconds {
            Some(seconds) if seconds < 60 => format!("{}s", seconds),
            Some(seconds) => format!("{}m {}s", seconds / 60, seconds % 60),
            None => "calculating...".to_string(),
        }
    }
}

impl BatchProgress for ConsoleProgressReporter {
    fn on_batch_complete(&self, processed: usize, total: usize) {
        let elapsed_ms = self.start_time.elapsed().as_millis() as u64;
        let snapshot = ProgressSnapshot::compute(processed, total, elapsed_ms);

        if self.verbose {
            log::info!(
                "[{}%] {}/{} images ({:.2} images/sec, ETA {})",
                snapshot.percentage(),
                processed,
                total,
                snapshot.items_per_second,
                Self::format_eta(snapshot.eta_seconds)
            );
        } else {
            log::info!("[{}%] {}/{} images", snapshot.percentage(), processed, total);
        }

        *self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_closure_receives_updates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = move |processed: usize, total: usize| {
            sink.lock().unwrap().push((processed, total));
        };

        progress.on_batch_complete(2, 5);
        progress.on_batch_complete(5, 5);
        assert_eq!(*seen.lock().unwrap(), vec![(2, 5), (5, 5)]);
    }

    #[test]
    fn test_snapshot_rate_and_eta() {
        let snapshot = ProgressSnapshot::compute(4, 10, 2000);
        assert!((snapshot.items_per_second - 2.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.eta_seconds, Some(3));
        assert_eq!(snapshot.percentage(), 40);

        let idle = ProgressSnapshot::compute(0, 10, 0);
        assert_eq!(idle.eta_seconds, None);
        assert_eq!(ProgressSnapshot::compute(0, 0, 10).percentage(), 100);
    }

    #[test]
    fn test_console_reporter_keeps_last_snapshot() {
        let reporter = ConsoleProgressReporter::new(true);
        assert!(reporter.last_snapshot().is_none());
        reporter.on_batch_complete(3, 6);
        let last = reporter.last_snapshot().unwrap();
        assert_eq!((last.processed, last.total), (3, 6));
    }

    #[test]
    fn test_eta_formatting() {
        assert_eq!(ConsoleProgressReporter::format_eta(Some(42)), "42s");
        assert_eq!(ConsoleProgressReporter::format_eta(Some(125)), "2m 5s");
        assert_eq!(ConsoleProgressReporter::format_eta(None), "calculating...");
    }
}
