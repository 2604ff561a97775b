//! The context module ties one driver to one in-flight table and hands out the two halves that
//! operate on them, the [SubmissionQueue] and the [Reactor].
//!
//! There is no process wide state: every [Context] is an explicit object with its own driver,
//! several of them may coexist in one process and each may be driven from its own thread. The
//! `'buf` lifetime of a context is the lifetime of the buffers its requests borrow, so every
//! buffer stays borrowed until the context, and with it the driver, is gone. Dropping the
//! driver waits for the kernel to finish with outstanding requests. Leaking a context with
//! requests in flight (for instance through [std::mem::forget]) leaves the kernel free to
//! touch memory the borrow checker considers released.

mod config;
mod error;
mod shared;
mod stats;

use std::sync::Arc;

use tracing::debug;

use crate::{queue::SubmissionQueue, reactor::Reactor, sys};

pub use config::{Config, ContextBuilder, DriverKind, PollingMode};
pub use error::{Error, Result};
pub(crate) use shared::Shared;
pub use stats::Stats;

/// A submission queue and reactor pair sharing one driver and one in-flight table.
pub struct Context<'buf> {
    queue: SubmissionQueue<'buf>,
    reactor: Reactor<'buf>,
}

impl<'buf> Context<'buf> {
    /// Create a context from a [Config], opening the configured driver.
    pub fn new(config: Config) -> Result<Context<'buf>> {
        config.validate()?;

        let driver = sys::open(&config).map_err(|source| Error::Setup {
            driver: config.driver(),
            source,
        })?;
        debug!(
            driver = driver.name(),
            max_in_flight = config.max_in_flight(),
            polling_mode = ?config.polling_mode(),
            "created context"
        );

        let shared = Arc::new(Shared::new(&config, driver));
        Ok(Context {
            queue: SubmissionQueue::new(shared.clone()),
            reactor: Reactor::new(shared),
        })
    }

    /// Create a default context configuration, which can then be customized.
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub fn queue(&self) -> &SubmissionQueue<'buf> {
        &self.queue
    }

    pub fn reactor(&self) -> &Reactor<'buf> {
        &self.reactor
    }

    /// Split the context so the halves can be moved to different threads.
    pub fn into_parts(self) -> (SubmissionQueue<'buf>, Reactor<'buf>) {
        (self.queue, self.reactor)
    }

    pub fn stats(&self) -> Stats {
        self.reactor.stats()
    }
}

#[allow(dead_code)]
trait AssertSendSync: Send + Sync {}
impl AssertSendSync for Context<'static> {}
