use std::sync::atomic::{AtomicU64, Ordering};

use crate::reactor::CompletionEvent;

/// A point in time snapshot of a context's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Requests accepted by the driver.
    pub submitted: u64,
    /// Completions dispatched with a non-negative result.
    pub completed: u64,
    /// Completions dispatched with `ECANCELED`.
    pub cancelled: u64,
    /// Completions dispatched with any other error.
    pub failed: u64,
    /// Completions that matched no live request.
    pub dangling: u64,
    /// Requests currently occupying the in-flight table.
    pub in_flight: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
    dangling: AtomicU64,
}

impl Counters {
    pub(crate) fn submitted(&self, count: usize) {
        self.submitted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn dispatched(&self, event: &CompletionEvent) {
        let counter = if event.is_cancelled() {
            &self.cancelled
        } else if event.result() < 0 {
            &self.failed
        } else {
            &self.completed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dangling(&self) {
        self.dangling.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, in_flight: usize) -> Stats {
        Stats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dangling: self.dangling.load(Ordering::Relaxed),
            in_flight,
        }
    }
}
