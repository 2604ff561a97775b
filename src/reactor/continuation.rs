use std::fmt;

use crate::sync::{Completion, OneShot};

use super::CompletionEvent;

/// What the reactor does with a completion once it has been matched to its request.
///
/// The continuation moves from the descriptor into the in-flight table at submission and is run
/// exactly once by [super::Reactor::dispatch_one], outside of any internal lock.
#[derive(Default)]
pub(crate) enum Continuation<'buf> {
    /// Nothing runs, the caller observes the outcome through
    /// [crate::RequestDescriptor::outcome].
    #[default]
    Detached,
    /// Run a callback with the event.
    Callback(Box<dyn FnOnce(&CompletionEvent) + Send + 'buf>),
    /// Resolve a [Completion] future.
    Notify(OneShot<CompletionEvent>),
}

impl<'buf> Continuation<'buf> {
    /// Create a continuation that resolves the returned future.
    pub(crate) fn notify() -> (Continuation<'buf>, Completion) {
        let shot = OneShot::new();
        (Continuation::Notify(shot.clone()), Completion::new(shot))
    }

    pub(crate) fn resume(self, event: &CompletionEvent) {
        match self {
            Continuation::Detached => {}
            Continuation::Callback(f) => f(event),
            Continuation::Notify(shot) => shot.complete(*event),
        }
    }
}

impl<'buf> fmt::Debug for Continuation<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuation::Detached => f.write_str("Detached"),
            Continuation::Callback(_) => f.write_str("Callback(..)"),
            Continuation::Notify(_) => f.write_str("Notify(..)"),
        }
    }
}
