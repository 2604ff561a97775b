//! The completion side of the framework. The [Reactor] reaps [CompletionEvent]s from the driver
//! and dispatches each one to the continuation of the request it belongs to. It never spawns a
//! thread, the main loop belongs to the caller:
//!
//! ```no_run
//! # use std::time::Duration;
//! # fn drive(ctx: &libaio::Context<'_>) -> Result<(), libaio::PollError> {
//! while ctx.queue().in_flight() > 0 {
//!     for event in ctx.reactor().poll(64, Some(Duration::from_millis(10)))? {
//!         if let Err(err) = ctx.reactor().dispatch_one(event) {
//!             eprintln!("{err}");
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod continuation;
mod dispatch;
mod error;
mod event;

pub(crate) use continuation::Continuation;
pub use dispatch::Reactor;
pub use error::{DispatchError, PollError};
pub use event::CompletionEvent;
