//! Synchronization primitives bridging reactor dispatch and `async` callers.

mod completion;
mod oneshot;

pub use completion::Completion;
pub(crate) use oneshot::OneShot;
