use crate::sys::RawRequest;

/// The requests handed to a driver in one call. A batch only lives for the duration of a single
/// [super::SubmissionQueue::submit] and is never retained afterwards.
pub(crate) struct SubmissionBatch {
    entries: Vec<RawRequest>,
}

impl SubmissionBatch {
    pub(crate) fn with_capacity(capacity: usize) -> SubmissionBatch {
        SubmissionBatch {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, request: RawRequest) {
        self.entries.push(request);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[RawRequest] {
        &self.entries
    }
}
