use std::fmt;

use super::{Context, Error, Result};

/// How [crate::Reactor::poll] waits for completions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PollingMode {
    /// Sleep in the driver until a completion arrives or the timeout passes.
    #[default]
    Blocking,
    /// Spin on non-blocking driver polls until a completion arrives or the timeout passes,
    /// trading a core for latency.
    BusyPoll,
}

/// The OS interface requests are submitted through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DriverKind {
    /// Linux native AIO (`io_submit`/`io_getevents`). Needs `O_DIRECT` to be truly asynchronous
    /// for regular files.
    #[default]
    LinuxAio,
    /// An `io_uring` instance.
    IoUring,
    /// An in-process emulation that performs requests synchronously while polling.
    Emulated,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::LinuxAio => f.write_str("linux-aio"),
            DriverKind::IoUring => f.write_str("io_uring"),
            DriverKind::Emulated => f.write_str("emulated"),
        }
    }
}

/// The validated settings of a [Context].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    max_in_flight: usize,
    polling_mode: PollingMode,
    driver: DriverKind,
    strict: bool,
    accept_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_in_flight: 256,
            polling_mode: PollingMode::default(),
            driver: DriverKind::default(),
            strict: cfg!(debug_assertions),
            accept_limit: None,
        }
    }
}

impl Config {
    /// The capacity of the in-flight table, and the queue depth requested from the kernel.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn polling_mode(&self) -> PollingMode {
        self.polling_mode
    }

    pub fn driver(&self) -> DriverKind {
        self.driver
    }

    /// Whether a dangling completion panics instead of only being reported.
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// The per-batch acceptance cap of the emulated driver.
    pub fn accept_limit(&self) -> Option<usize> {
        self.accept_limit
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(Error::InvalidConfig("max_in_flight must be greater than zero"));
        }
        if self.max_in_flight > u32::MAX as usize {
            return Err(Error::InvalidConfig("max_in_flight must fit in 32 bits"));
        }
        if self.accept_limit.is_some() && self.driver != DriverKind::Emulated {
            return Err(Error::InvalidConfig(
                "accept_limit is only supported by the emulated driver",
            ));
        }
        Ok(())
    }
}

/// Context configuration object.
///
/// ```no_run
/// use libaio::{Context, DriverKind, PollingMode};
///
/// # fn main() -> Result<(), libaio::context::Error> {
/// let ctx = Context::builder()
///     .max_in_flight(1024)
///     .driver(DriverKind::IoUring)
///     .polling_mode(PollingMode::BusyPoll)
///     .build()?;
/// # drop(ctx);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ContextBuilder {
    config: Config,
}

impl ContextBuilder {
    /// Create a builder with the default configuration: 256 requests in flight, blocking polls,
    /// the Linux AIO driver, and strict dangling checks in debug builds.
    pub fn new() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Set the maximum number of requests in flight at once, must be greater than zero.
    pub fn max_in_flight(&mut self, max_in_flight: usize) -> &mut Self {
        self.config.max_in_flight = max_in_flight;
        self
    }

    pub fn polling_mode(&mut self, mode: PollingMode) -> &mut Self {
        self.config.polling_mode = mode;
        self
    }

    pub fn driver(&mut self, driver: DriverKind) -> &mut Self {
        self.config.driver = driver;
        self
    }

    /// Panic on dangling completions instead of only logging and returning an error.
    pub fn strict(&mut self, strict: bool) -> &mut Self {
        self.config.strict = strict;
        self
    }

    /// Cap how many requests of a single batch the emulated driver accepts.
    pub fn accept_limit(&mut self, limit: usize) -> &mut Self {
        self.config.accept_limit = Some(limit);
        self
    }

    /// The configuration as currently set, unvalidated.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate the configuration and open the driver.
    pub fn build<'buf>(&mut self) -> Result<Context<'buf>> {
        Context::new(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_in_flight(), 256);
        assert_eq!(config.polling_mode(), PollingMode::Blocking);
        assert_eq!(config.driver(), DriverKind::LinuxAio);
        assert_eq!(config.strict(), cfg!(debug_assertions));
        assert_eq!(config.accept_limit(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let mut builder = ContextBuilder::new();
        builder.max_in_flight(0);
        assert!(matches!(
            builder.config().validate(),
            Err(Error::InvalidConfig(_))
        ));

        let mut builder = ContextBuilder::new();
        builder.accept_limit(3);
        assert!(matches!(
            builder.config().validate(),
            Err(Error::InvalidConfig(_))
        ));

        builder.driver(DriverKind::Emulated);
        assert!(builder.config().validate().is_ok());
    }
}
