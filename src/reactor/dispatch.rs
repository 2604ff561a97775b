use std::{
    hint,
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{error, trace};

use crate::{
    context::{PollingMode, Shared, Stats},
    queue::{table::SlotState, CorrelationKey},
    sys::RawEvent,
};

use super::{CompletionEvent, DispatchError, PollError};

/// The completion half of a [crate::Context]. The reactor owns no thread, the caller drives it
/// by alternating [Reactor::poll] and [Reactor::dispatch_one], or with [Reactor::run_once].
pub struct Reactor<'buf> {
    shared: Arc<Shared<'buf>>,
}

impl<'buf> Reactor<'buf> {
    pub(crate) fn new(shared: Arc<Shared<'buf>>) -> Reactor<'buf> {
        Reactor { shared }
    }

    /// Reap up to `max_events` completions.
    ///
    /// A `timeout` of `Some(Duration::ZERO)` never blocks, `None` waits until at least one
    /// completion is available. An expired timeout, or a wait interrupted by a signal, yields an
    /// empty vector. In [PollingMode::BusyPoll] the driver is polled without sleeping until
    /// something arrives or the deadline passes.
    pub fn poll(
        &self,
        max_events: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<CompletionEvent>, PollError> {
        if max_events == 0 {
            return Ok(Vec::new());
        }

        let driver = self.shared.driver();
        let mut raw: Vec<RawEvent> = Vec::with_capacity(max_events.min(1024));
        match self.shared.polling_mode() {
            PollingMode::Blocking => driver.poll(max_events, timeout, &mut raw)?,
            PollingMode::BusyPoll => {
                let deadline = timeout.map(|timeout| Instant::now() + timeout);
                loop {
                    driver.poll(max_events, Some(Duration::ZERO), &mut raw)?;
                    if !raw.is_empty() || deadline.is_some_and(|d| Instant::now() >= d) {
                        break;
                    }
                    hint::spin_loop();
                }
            }
        }

        trace!(count = raw.len(), "reaped completions");
        Ok(raw.into_iter().map(CompletionEvent::from).collect())
    }

    /// Route `event` to its request: record the outcome on the descriptor, run its
    /// continuation, and free the correlation key.
    ///
    /// The continuation runs without any internal lock held, so it may submit or cancel on the
    /// same context. An event whose key is unknown, stale, or already dispatched is a dangling
    /// completion: it is logged, counted, and reported as [DispatchError::Dangling], and in
    /// strict mode it panics.
    pub fn dispatch_one(&self, event: CompletionEvent) -> Result<(), DispatchError> {
        let key = event.key();
        let claimed = {
            let mut table = self.shared.lock_table();
            table
                .get_mut(key)
                .filter(|slot| {
                    matches!(
                        slot.state,
                        SlotState::Submitted | SlotState::CancelRequested
                    )
                })
                .map(|slot| {
                    slot.state = SlotState::Dispatching;
                    (std::mem::take(&mut slot.continuation), slot.tracker.clone())
                })
        };

        let (continuation, tracker) = match claimed {
            Some(claimed) => claimed,
            None => return Err(self.dangling(key)),
        };

        trace!(%key, result = event.result(), aux = event.aux(), "dispatching completion");
        let _release = Release {
            shared: &self.shared,
            event,
        };
        tracker.finish(event);
        continuation.resume(&event);
        Ok(())
    }

    /// Poll once and dispatch everything that was reaped, returning how many events were
    /// dispatched. Dangling completions are skipped.
    pub fn run_once(
        &self,
        max_events: usize,
        timeout: Option<Duration>,
    ) -> Result<usize, PollError> {
        let events = self.poll(max_events, timeout)?;
        Ok(events
            .into_iter()
            .filter(|event| self.dispatch_one(*event).is_ok())
            .count())
    }

    pub fn stats(&self) -> Stats {
        self.shared.stats()
    }

    fn dangling(&self, key: CorrelationKey) -> DispatchError {
        self.shared.counters().dangling();
        error!(%key, "dangling completion");
        if self.shared.strict() {
            panic!("dangling completion for request {key}");
        }
        DispatchError::Dangling(key)
    }
}

/// Frees a claimed slot once its continuation has run, including when the continuation panics.
struct Release<'a, 'buf> {
    shared: &'a Shared<'buf>,
    event: CompletionEvent,
}

impl<'a, 'buf> Drop for Release<'a, 'buf> {
    fn drop(&mut self) {
        self.shared.lock_table().release(self.event.key());
        self.shared.counters().dispatched(&self.event);
    }
}

impl<'buf> Clone for Reactor<'buf> {
    fn clone(&self) -> Self {
        Reactor {
            shared: self.shared.clone(),
        }
    }
}
