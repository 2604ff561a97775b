use std::io;

use thiserror::Error;

use super::CorrelationKey;

/// Errors returned by [super::SubmissionQueue::submit]. Apart from [SubmissionError::Os] every
/// variant is raised before anything reaches the driver.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("descriptors at positions {positions:?} are not pending")]
    AlreadySubmitted { positions: Vec<usize> },
    #[error("submission queue is full, {capacity} requests already in flight")]
    QueueFull { capacity: usize },
    #[error("driver does not support {0}")]
    Unsupported(&'static str),
    #[error("driver rejected the batch after accepting {accepted} requests: {source}")]
    Os {
        accepted: usize,
        #[source]
        source: io::Error,
    },
}

impl SubmissionError {
    /// The raw OS error code when the driver rejected the batch.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            SubmissionError::Os { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Errors returned by [super::SubmissionQueue::cancel]. None of them are fatal, the completion
/// of the request (if any is outstanding) is still delivered through the reactor.
#[derive(Debug, Error)]
pub enum CancelError {
    #[error("request {0} already completed")]
    AlreadyCompleted(CorrelationKey),
    #[error("request {0} can not be cancelled by the driver")]
    NotCancellable(CorrelationKey),
    #[error("failed to cancel request {key}: {source}")]
    Os {
        key: CorrelationKey,
        #[source]
        source: io::Error,
    },
}
