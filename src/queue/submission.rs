use std::{io, sync::Arc};

use nix::libc;
use tracing::{debug, warn};

use crate::{
    context::Shared,
    request::{RequestDescriptor, State},
};

use super::{table::SlotState, CancelError, CorrelationKey, SubmissionBatch, SubmissionError};

/// The submission half of a [crate::Context]. It reserves correlation keys for pending
/// descriptors and hands them to the driver in a single call per batch.
///
/// A [SubmissionQueue] is cheap to clone, every clone shares the same in-flight table and driver
/// as the [crate::Reactor] it was created with.
pub struct SubmissionQueue<'buf> {
    shared: Arc<Shared<'buf>>,
}

impl<'buf> SubmissionQueue<'buf> {
    pub(crate) fn new(shared: Arc<Shared<'buf>>) -> SubmissionQueue<'buf> {
        SubmissionQueue { shared }
    }

    /// Submit every descriptor in `descriptors` with one driver call, returning how many were
    /// accepted.
    ///
    /// Acceptance is always a prefix: the first `n` descriptors become [State::Submitted] and the
    /// rest stay [State::Pending] so the caller can offer them again later. The queue never
    /// retries on its own. When the batch is larger than the free capacity of the in-flight
    /// table only the fitting prefix is offered to the driver, so `Ok(n)` with `n` below the
    /// batch length may mean the table filled up as well as a short OS acceptance.
    /// [SubmissionError::QueueFull] is only returned when not a single slot is free.
    ///
    /// Nothing is submitted when any descriptor is not pending, when the table is full, or when
    /// the driver rejects the batch outright.
    pub fn submit(
        &self,
        descriptors: &mut [RequestDescriptor<'buf>],
    ) -> Result<usize, SubmissionError> {
        if descriptors.is_empty() {
            return Ok(0);
        }

        let positions: Vec<usize> = descriptors
            .iter()
            .enumerate()
            .filter(|(_, desc)| desc.state() != State::Pending)
            .map(|(idx, _)| idx)
            .collect();
        if !positions.is_empty() {
            return Err(SubmissionError::AlreadySubmitted { positions });
        }

        let mut table = self.shared.lock_table();
        let available = table.available();
        if available == 0 {
            return Err(SubmissionError::QueueFull {
                capacity: table.capacity(),
            });
        }

        let total = descriptors.len();
        let offered = total.min(available);
        let descriptors = &mut descriptors[..offered];

        let mut batch = SubmissionBatch::with_capacity(offered);
        let mut keys = Vec::with_capacity(offered);
        for desc in descriptors.iter_mut() {
            let key = table.reserve(desc.tracker().clone());
            keys.push(key);

            let raw = desc.as_raw(key.to_token());
            if let Err(reason) = self.shared.driver().validate(&raw) {
                for key in keys {
                    table.release(key);
                }
                return Err(SubmissionError::Unsupported(reason));
            }
            batch.push(raw);
        }

        let accepted = match self.shared.driver().submit(&batch) {
            Ok(accepted) => accepted.min(batch.len()),
            Err(source) => {
                for key in keys {
                    table.release(key);
                }
                warn!(offered, error = %source, "driver rejected submission batch");
                return Err(SubmissionError::Os {
                    accepted: 0,
                    source,
                });
            }
        };

        for (desc, key) in descriptors.iter_mut().zip(&keys).take(accepted) {
            if let Some(slot) = table.get_mut(*key) {
                slot.state = SlotState::Submitted;
                slot.continuation = desc.take_continuation();
            }
            desc.tracker().submitted(*key);
        }
        for key in &keys[accepted..] {
            table.release(*key);
        }
        drop(table);

        self.shared.counters().submitted(accepted);
        if accepted < total {
            warn!(total, offered, accepted, "submitted a partial batch");
        } else {
            debug!(accepted, "submitted batch");
        }
        Ok(accepted)
    }

    /// Ask the driver to cancel the request behind `key`. This is best effort: on success the
    /// completion is still delivered through the reactor, typically carrying `ECANCELED`, and is
    /// dispatched exactly once like any other completion.
    pub fn cancel(&self, key: CorrelationKey) -> Result<(), CancelError> {
        let mut table = self.shared.lock_table();
        let slot = match table.get_mut(key) {
            Some(slot) => slot,
            None => return Err(CancelError::AlreadyCompleted(key)),
        };

        match slot.state {
            SlotState::Submitted => {}
            SlotState::CancelRequested => return Ok(()),
            SlotState::Reserved | SlotState::Dispatching => {
                return Err(CancelError::AlreadyCompleted(key))
            }
        }

        match self.shared.driver().cancel(key.to_token()) {
            Ok(()) => {
                slot.state = SlotState::CancelRequested;
                debug!(%key, "requested cancellation");
                Ok(())
            }
            Err(source) => Err(cancel_error(key, source)),
        }
    }

    /// Number of requests currently tracked by the in-flight table.
    pub fn in_flight(&self) -> usize {
        self.shared.lock_table().len()
    }

    /// The maximum number of requests that may be in flight at once.
    pub fn capacity(&self) -> usize {
        self.shared.lock_table().capacity()
    }

    /// Whether `key` still refers to a live request.
    pub fn is_in_flight(&self, key: CorrelationKey) -> bool {
        self.shared.lock_table().get(key).is_some()
    }
}

impl<'buf> Clone for SubmissionQueue<'buf> {
    fn clone(&self) -> Self {
        SubmissionQueue {
            shared: self.shared.clone(),
        }
    }
}

fn cancel_error(key: CorrelationKey, source: io::Error) -> CancelError {
    match source.raw_os_error() {
        Some(libc::ENOENT) | Some(libc::EALREADY) | Some(libc::EAGAIN) => {
            CancelError::AlreadyCompleted(key)
        }
        Some(libc::EINVAL) | Some(libc::EOPNOTSUPP) => CancelError::NotCancellable(key),
        _ => CancelError::Os { key, source },
    }
}
