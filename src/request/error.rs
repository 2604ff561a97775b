use core::result;
use thiserror::Error;

use super::Kind;

/// A helper type for wrapping a [result::Result] such that we can reduce noise in our signatures.
pub type Result<T> = result::Result<T, Error>;

/// Caller errors raised while building or reshaping a [super::RequestDescriptor]. These are
/// always local to the call that produced them and are never worth retrying as is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("request has already been submitted")]
    AlreadySubmitted,
    #[error("can not change request kind from {from} to {to} without a new buffer")]
    IncompatibleKindChange { from: Kind, to: Kind },
}
