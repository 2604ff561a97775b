use std::io;

use thiserror::Error;

use crate::queue::CorrelationKey;

/// Errors returned by [super::Reactor::poll].
#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to reap completions: {0}")]
    Os(#[from] io::Error),
}

/// Errors returned by [super::Reactor::dispatch_one].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The key does not match a live request, it was never issued, its slot was freed and
    /// reused, or the event was already dispatched.
    #[error("dangling completion for {0}")]
    Dangling(CorrelationKey),
}
