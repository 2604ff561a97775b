use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::future::FusedFuture;

use crate::reactor::CompletionEvent;

use super::OneShot;

/// A future resolving to the [CompletionEvent] of a single request, created with
/// [crate::RequestDescriptor::completion].
///
/// The future is woken by [crate::Reactor::dispatch_one], it does nothing to drive the reactor
/// itself. If the context is dropped before the request is dispatched the future never resolves.
#[derive(Debug)]
pub struct Completion {
    shot: OneShot<CompletionEvent>,
    done: bool,
}

impl Completion {
    pub(crate) fn new(shot: OneShot<CompletionEvent>) -> Completion {
        Completion { shot, done: false }
    }

    /// Take the event without waiting, if it has already been dispatched.
    pub fn try_take(&mut self) -> Option<CompletionEvent> {
        let event = self.shot.take();
        self.done |= event.is_some();
        event
    }
}

impl Future for Completion {
    type Output = CompletionEvent;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Register first so a completion racing this poll always sees a waker.
        self.shot.set_waker(cx.waker().clone());
        match self.try_take() {
            Some(event) => Poll::Ready(event),
            None => Poll::Pending,
        }
    }
}

impl FusedFuture for Completion {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use crate::queue::CorrelationKey;

    use super::*;

    #[test]
    fn test_resolves_after_complete() {
        let shot = OneShot::new();
        let mut completion = Completion::new(shot.clone());
        assert!((&mut completion).now_or_never().is_none());
        assert!(!completion.is_terminated());

        let event = CompletionEvent::new(CorrelationKey::new(1, 0), 8, 0);
        shot.complete(event);
        assert_eq!((&mut completion).now_or_never(), Some(event));
        assert!(completion.is_terminated());
    }
}
