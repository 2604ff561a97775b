//! Request descriptors, the caller side description of a single asynchronous I/O operation.
//!
//! A [RequestDescriptor] binds an operation [Kind] to a file descriptor, a borrowed [Buffer],
//! a length, an offset and an optional [Priority]. The kind and the fields that only make sense
//! for it are stored together, so a sync or poll request simply has no buffer, length or offset
//! to misuse. Reshaping a descriptor is done with [RequestDescriptor::change_kind], which hands
//! back a new value instead of mutating the request in place.
//!
//! Descriptors never perform a syscall themselves, validation of the file descriptor is left to
//! the OS at submission time.

mod buffer;
mod descriptor;
mod error;
mod kind;
mod priority;
mod tracker;

pub use buffer::Buffer;
pub use descriptor::{DescriptorBuilder, RequestDescriptor};
pub use error::{Error, Result};
pub use kind::Kind;
pub use priority::{Priority, PriorityClass};
pub use tracker::State;
pub(crate) use tracker::Tracker;
