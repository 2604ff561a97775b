//! The submission side of the framework. The [SubmissionQueue] owns nothing but a handle to the
//! in-flight table it shares with the [crate::Reactor], it reserves a [CorrelationKey] per
//! request, lowers the descriptors into a batch and hands that batch to the driver in a single
//! call.
//!
//! Correlation keys pair an arena index with a generation counter, the kernel only ever carries
//! the packed `u64` and never a pointer back into our memory.

mod batch;
mod error;
mod key;
mod submission;
pub(crate) mod table;

pub(crate) use batch::SubmissionBatch;
pub use error::{CancelError, SubmissionError};
pub use key::CorrelationKey;
pub use submission::SubmissionQueue;
pub(crate) use table::InFlightTable;
