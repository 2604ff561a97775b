//! # libaio
//!
//! An asynchronous I/O request/completion framework modelled on Linux native AIO. Callers
//! describe operations as [RequestDescriptor]s, hand them to a [SubmissionQueue] in batches, and
//! drive a [Reactor] that reaps [CompletionEvent]s and dispatches each one to the continuation of
//! the request it belongs to. The framework never spawns a thread, the main loop belongs to the
//! caller.
//!
//! Requests and completions are linked by a [CorrelationKey], an index into an in-flight table
//! paired with a generation counter, so a completion can never be routed to a request that
//! reused the slot of an earlier one. Three drivers sit behind the same interface: Linux native
//! AIO, `io_uring`, and an in-process emulation used for testing.
//!
//! Copying the first 4KiB of one file into another:
//!
//! ```no_run
//! use std::{fs::File, os::fd::AsRawFd};
//!
//! use libaio::{Context, DriverKind, RequestDescriptor};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let src = File::open("/tmp/source")?;
//!     let dst = File::create("/tmp/destination")?;
//!     let mut buf = vec![0u8; 4096];
//!
//!     let read = {
//!         // The context borrows the buffer for as long as it lives.
//!         let ctx = Context::builder().driver(DriverKind::LinuxAio).build()?;
//!         let mut read = RequestDescriptor::read(src.as_raw_fd(), &mut buf, 0)?;
//!         ctx.queue().submit(std::slice::from_mut(&mut read))?;
//!         while ctx.queue().in_flight() > 0 {
//!             ctx.reactor().run_once(1, None)?;
//!         }
//!         read.outcome().map(|event| event.outcome())
//!     };
//!     let len = read.ok_or("read was not dispatched")??;
//!
//!     let ctx = Context::builder().build()?;
//!     let mut write = RequestDescriptor::write(dst.as_raw_fd(), &buf[..len], 0)?;
//!     let done = write.completion()?;
//!     ctx.queue().submit(std::slice::from_mut(&mut write))?;
//!     ctx.reactor().run_once(1, None)?;
//!
//!     let event = futures::executor::block_on(done);
//!     println!("wrote {} bytes", event.outcome()?);
//!     Ok(())
//! }
//! ```

pub mod context;
pub(crate) mod ptr;
pub mod queue;
pub mod reactor;
pub mod request;
pub mod sync;
pub(crate) mod sys;

pub use context::{Config, Context, ContextBuilder, DriverKind, PollingMode, Stats};
pub use queue::{CancelError, CorrelationKey, SubmissionError, SubmissionQueue};
pub use reactor::{CompletionEvent, DispatchError, PollError, Reactor};
pub use request::{
    Buffer, DescriptorBuilder, Kind, Priority, PriorityClass, RequestDescriptor, State,
};
pub use sync::Completion;
