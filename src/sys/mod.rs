//! The OS boundary. Every driver implements [Driver] and speaks only in [RawRequest]s and
//! [RawEvent]s, the `u64` token they carry is the packed [crate::CorrelationKey] and is handed
//! back untouched with the completion.
//!
//! - [aio::LinuxAio] talks to the kernel's native AIO interface through raw syscalls.
//! - [uring::Uring] submits through an `io_uring` instance.
//! - [emulated::Emulated] executes requests in-process, for tests and for hosts without either.

use std::{io, os::fd::RawFd, time::Duration};

use nix::libc;

use crate::{
    context::{Config, DriverKind},
    ptr::{SendConst, SendMut},
    queue::SubmissionBatch,
};

pub(crate) mod aio;
pub(crate) mod emulated;
pub(crate) mod uring;

/// The lowered operation of a request, with raw pointers into the caller's borrowed buffers.
#[derive(Clone, Copy, Debug)]
pub(crate) enum RawOp {
    Read {
        buf: SendMut<u8>,
        len: usize,
        offset: u64,
    },
    Write {
        buf: SendConst<u8>,
        len: usize,
        offset: u64,
    },
    ReadV {
        iov: SendConst<libc::iovec>,
        count: usize,
        offset: u64,
    },
    WriteV {
        iov: SendConst<libc::iovec>,
        count: usize,
        offset: u64,
    },
    Fsync,
    Fdatasync,
    Poll {
        events: u32,
    },
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct RawRequest {
    pub token: u64,
    pub fd: RawFd,
    pub op: RawOp,
    pub ioprio: Option<u16>,
    pub notify: Option<RawFd>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RawEvent {
    pub token: u64,
    pub res: i64,
    pub res2: i64,
}

/// The seam between the framework and the OS.
///
/// Implementations must be safe to share between a submitting thread and a polling thread, and
/// must not return from `drop` while the kernel may still touch a submitted buffer.
pub(crate) trait Driver: Send + Sync {
    /// Reject requests the driver can not express, before anything is submitted.
    fn validate(&self, _request: &RawRequest) -> Result<(), &'static str> {
        Ok(())
    }

    /// Submit the batch in one call, returning how many leading entries were accepted. An error
    /// means nothing was accepted.
    fn submit(&self, batch: &SubmissionBatch) -> io::Result<usize>;

    /// Append up to `max` completions to `events`. `Some(Duration::ZERO)` never blocks, `None`
    /// blocks until at least one completion is available. A timeout or signal leaves `events`
    /// untouched and returns `Ok`.
    fn poll(&self, max: usize, timeout: Option<Duration>, events: &mut Vec<RawEvent>)
        -> io::Result<()>;

    /// Best effort cancellation of the request carrying `token`. The completion still arrives
    /// through [Driver::poll].
    fn cancel(&self, token: u64) -> io::Result<()>;

    fn name(&self) -> &'static str;
}

/// Create the driver selected by `config`.
pub(crate) fn open(config: &Config) -> io::Result<Box<dyn Driver>> {
    let entries = config.max_in_flight();
    Ok(match config.driver() {
        DriverKind::LinuxAio => Box::new(aio::LinuxAio::new(entries)?),
        DriverKind::IoUring => Box::new(uring::Uring::new(entries)?),
        DriverKind::Emulated => Box::new(emulated::Emulated::new(config.accept_limit())),
    })
}
