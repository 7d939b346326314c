//! Fetch progress events, rate-limited before they reach the logger.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Coarse phase of an in-flight fetch, surfaced to the status dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Starting,
    Transferring,
    Completed,
}

/// A single progress sample.
#[derive(Debug, Clone)]
pub struct FetchProgress {
    pub phase: FetchPhase,
    pub loaded: Option<u64>,
    pub total: Option<u64>,
    pub fetched_files: usize,
    pub total_files: usize,
    pub errors: usize,
    pub current_file: Option<String>,
}

impl FetchProgress {
    pub fn starting() -> Self {
        Self {
            phase: FetchPhase::Starting,
            loaded: None,
            total: None,
            fetched_files: 0,
            total_files: 0,
            errors: 0,
            current_file: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            phase: FetchPhase::Completed,
            loaded: None,
            total: None,
            fetched_files: 0,
            total_files: 0,
            errors: 0,
            current_file: None,
        }
    }
}

/// Throttles a progress callback so it fires at most once per `interval`,
/// always letting `Starting`/`Completed` samples through regardless of
/// timing since they mark the boundaries of the operation.
pub struct ProgressThrottle<F> {
    inner: F,
    last_logged: Mutex<Option<Instant>>,
    interval: Duration,
}

impl<F: Fn(FetchProgress)> ProgressThrottle<F> {
    pub fn new(interval: Duration, inner: F) -> Self {
        Self {
            inner,
            last_logged: Mutex::new(None),
            interval,
        }
    }

    pub fn report(&self, progress: FetchProgress) {
        let boundary = matches!(progress.phase, FetchPhase::Starting | FetchPhase::Completed);
        let mut last = self.last_logged.lock().unwrap();
        let should_emit = boundary
            || last
                .map(|t| t.elapsed() >= self.interval)
                .unwrap_or(true);
        if should_emit {
            *last = Some(Instant::now());
            drop(last);
            (self.inner)(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn throttle_always_lets_boundaries_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let throttle = ProgressThrottle::new(Duration::from_secs(60), move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        throttle.report(FetchProgress::starting());
        throttle.report(FetchProgress::completed());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn throttle_suppresses_rapid_transfer_samples() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let throttle = ProgressThrottle::new(Duration::from_secs(60), move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut sample = FetchProgress::starting();
        sample.phase = FetchPhase::Transferring;
        throttle.report(sample.clone());
        throttle.report(sample.clone());
        throttle.report(sample);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
