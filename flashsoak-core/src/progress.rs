//! A byte counter that a reporting thread can poll while I/O runs.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, monotonically increasing count of bytes processed in the current
/// phase. Clones observe the same value.
///
/// Only the orchestrator writes to it; everyone else should only `get`.
#[derive(Clone, Debug, Default)]
pub struct ProgressCounter {
    done: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new phase of `total` bytes.
    pub(crate) fn start(&self, total: u64) {
        self.done.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
    }

    /// Records an absolute position. Values lower than the current one are
    /// ignored so readers never see the count go backwards mid-phase.
    pub(crate) fn set(&self, bytes: u64) {
        self.done.fetch_max(bytes, Ordering::AcqRel);
    }

    pub fn get(&self) -> u64 {
        self.done.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Completion in `0.0..=1.0`; an empty phase counts as complete.
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            1.0
        } else {
            (self.get() as f64 / total as f64).min(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let counter = ProgressCounter::new();
        let reader = counter.clone();
        counter.start(100);
        counter.set(40);
        assert_eq!(reader.get(), 40);
        assert_eq!(reader.total(), 100);
        assert!((reader.fraction() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn never_goes_backwards_within_a_phase() {
        let counter = ProgressCounter::new();
        counter.start(100);
        counter.set(60);
        counter.set(30);
        assert_eq!(counter.get(), 60);
        counter.start(50);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn visible_from_another_thread() {
        let counter = ProgressCounter::new();
        counter.start(10);
        let reader = counter.clone();
        std::thread::spawn(move || counter.set(10)).join().unwrap();
        assert_eq!(reader.get(), 10);
        assert_eq!(reader.fraction(), 1.0);
    }
}
