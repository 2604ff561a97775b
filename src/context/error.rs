use std::io;

use thiserror::Error;

use super::DriverKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while creating a [super::Context].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to set up the {driver} driver: {source}")]
    Setup {
        driver: DriverKind,
        #[source]
        source: io::Error,
    },
}
