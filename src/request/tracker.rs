use std::sync::{Arc, Mutex, MutexGuard};

use crate::{queue::CorrelationKey, reactor::CompletionEvent};

/// The lifecycle of a [super::RequestDescriptor] as seen by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Built but not yet accepted by a driver, the only state in which a descriptor may be
    /// reshaped or submitted.
    Pending,
    /// Accepted by a driver, the buffer belongs to the driver until the completion arrives.
    Submitted,
    /// The completion was dispatched.
    Completed,
    /// The completion was dispatched and reported that the request was cancelled.
    Cancelled,
}

#[derive(Debug)]
struct Lifecycle {
    state: State,
    key: Option<CorrelationKey>,
    outcome: Option<CompletionEvent>,
}

/// Lifecycle state shared between a descriptor and its in-flight table slot. The caller reads
/// it through the descriptor while the reactor records the outcome through the slot.
#[derive(Clone, Debug)]
pub(crate) struct Tracker(Arc<Mutex<Lifecycle>>);

impl Tracker {
    pub(crate) fn new() -> Tracker {
        Tracker(Arc::new(Mutex::new(Lifecycle {
            state: State::Pending,
            key: None,
            outcome: None,
        })))
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.0
            .lock()
            .expect("failed to lock request lifecycle: poisoned")
    }

    pub(crate) fn state(&self) -> State {
        self.lock().state
    }

    pub(crate) fn key(&self) -> Option<CorrelationKey> {
        self.lock().key
    }

    pub(crate) fn outcome(&self) -> Option<CompletionEvent> {
        self.lock().outcome
    }

    pub(crate) fn submitted(&self, key: CorrelationKey) {
        let mut lifecycle = self.lock();
        lifecycle.state = State::Submitted;
        lifecycle.key = Some(key);
        lifecycle.outcome = None;
    }

    pub(crate) fn finish(&self, event: CompletionEvent) {
        let mut lifecycle = self.lock();
        lifecycle.state = if event.is_cancelled() {
            State::Cancelled
        } else {
            State::Completed
        };
        lifecycle.outcome = Some(event);
    }

    /// Return a finished request to [State::Pending], keeping its last key so the descriptor
    /// identity survives reuse. Fails if the request is still in flight.
    pub(crate) fn reset(&self) -> bool {
        let mut lifecycle = self.lock();
        match lifecycle.state {
            State::Submitted => false,
            _ => {
                lifecycle.state = State::Pending;
                lifecycle.outcome = None;
                true
            }
        }
    }
}
