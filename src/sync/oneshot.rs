use std::{
    sync::{Arc, Mutex, MutexGuard},
    task::Waker,
};

#[derive(Debug)]
enum OneShotInner<T> {
    Pending,
    Complete(T),
    Finalized,
}

impl<T> OneShotInner<T> {
    fn complete(&mut self, val: T) {
        use OneShotInner::*;
        match self {
            Finalized => panic!("invalid state can not call complete on finalized one shot."),
            Complete(..) => panic!("invalid state can not call complete more than once."),
            Pending => *self = Complete(val),
        };
    }

    fn take(&mut self) -> Option<T> {
        use OneShotInner::*;
        match std::mem::replace(self, Finalized) {
            Complete(val) => Some(val),
            Pending => {
                *self = Pending;
                None
            }
            Finalized => None,
        }
    }
}

/// A single-use cell shared between the reactor, which completes it while dispatching, and the
/// [super::Completion] future the caller awaits. Completing it twice is a bug and panics.
#[derive(Debug)]
pub(crate) struct OneShot<T> {
    inner: Arc<Mutex<OneShotInner<T>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

impl<T> OneShot<T> {
    pub(crate) fn new() -> OneShot<T> {
        OneShot {
            inner: Arc::new(Mutex::new(OneShotInner::Pending)),
            waker: Arc::new(Mutex::new(None)),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, OneShotInner<T>> {
        self.inner
            .lock()
            .expect("failed to lock oneshot result: poisoned")
    }

    fn lock_waker(&self) -> MutexGuard<'_, Option<Waker>> {
        self.waker
            .lock()
            .expect("failed to lock oneshot waker: poisoned")
    }

    pub(crate) fn complete(&self, val: T) {
        self.lock_inner().complete(val);
        if let Some(waker) = self.lock_waker().take() {
            waker.wake()
        }
    }

    pub(crate) fn take(&self) -> Option<T> {
        self.lock_inner().take()
    }

    pub(crate) fn set_waker(&self, waker: Waker) {
        self.lock_waker().replace(waker);
    }
}

impl<T> Clone for OneShot<T> {
    fn clone(&self) -> Self {
        OneShot {
            inner: self.inner.clone(),
            waker: self.waker.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_before_and_after_complete() {
        let shot = OneShot::new();
        assert_eq!(shot.take(), None);

        shot.clone().complete(7u32);
        assert_eq!(shot.take(), Some(7));
        assert_eq!(shot.take(), None);
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn test_double_complete_panics() {
        let shot = OneShot::new();
        shot.complete(1u32);
        shot.complete(2u32);
    }
}
