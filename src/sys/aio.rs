use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use nix::{errno::Errno, libc};
use tracing::{debug, warn};

use crate::queue::SubmissionBatch;

use super::{Driver, RawEvent, RawOp, RawRequest};

const IOCB_CMD_PREAD: u16 = 0;
const IOCB_CMD_PWRITE: u16 = 1;
const IOCB_CMD_FSYNC: u16 = 2;
const IOCB_CMD_FDSYNC: u16 = 3;
const IOCB_CMD_POLL: u16 = 5;
const IOCB_CMD_PREADV: u16 = 7;
const IOCB_CMD_PWRITEV: u16 = 8;

const IOCB_FLAG_RESFD: u32 = 1 << 0;
const IOCB_FLAG_IOPRIO: u32 = 1 << 1;

type AioContext = libc::c_ulong;

/// `struct iocb` from `linux/aio_abi.h`.
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Default)]
struct Iocb {
    aio_data: u64,
    #[cfg(target_endian = "little")]
    aio_key: u32,
    #[cfg(target_endian = "little")]
    aio_rw_flags: i32,
    #[cfg(target_endian = "big")]
    aio_rw_flags: i32,
    #[cfg(target_endian = "big")]
    aio_key: u32,
    aio_lio_opcode: u16,
    aio_reqprio: i16,
    aio_fildes: u32,
    aio_buf: u64,
    aio_nbytes: u64,
    aio_offset: i64,
    aio_reserved2: u64,
    aio_flags: u32,
    aio_resfd: u32,
}

impl Iocb {
    fn new(request: &RawRequest) -> Iocb {
        let (opcode, buf, nbytes, offset) = match request.op {
            RawOp::Read { buf, len, offset } => {
                (IOCB_CMD_PREAD, buf.to_ptr() as u64, len as u64, offset)
            }
            RawOp::Write { buf, len, offset } => {
                (IOCB_CMD_PWRITE, buf.to_ptr() as u64, len as u64, offset)
            }
            RawOp::ReadV { iov, count, offset } => {
                (IOCB_CMD_PREADV, iov.to_ptr() as u64, count as u64, offset)
            }
            RawOp::WriteV { iov, count, offset } => {
                (IOCB_CMD_PWRITEV, iov.to_ptr() as u64, count as u64, offset)
            }
            RawOp::Fsync => (IOCB_CMD_FSYNC, 0, 0, 0),
            RawOp::Fdatasync => (IOCB_CMD_FDSYNC, 0, 0, 0),
            // The poll mask travels in the buffer field.
            RawOp::Poll { events } => (IOCB_CMD_POLL, events as u64, 0, 0),
        };

        let mut iocb = Iocb {
            aio_data: request.token,
            aio_lio_opcode: opcode,
            aio_fildes: request.fd as u32,
            aio_buf: buf,
            aio_nbytes: nbytes,
            aio_offset: offset as i64,
            ..Default::default()
        };
        if let Some(ioprio) = request.ioprio {
            iocb.aio_flags |= IOCB_FLAG_IOPRIO;
            iocb.aio_reqprio = ioprio as i16;
        }
        if let Some(fd) = request.notify {
            iocb.aio_flags |= IOCB_FLAG_RESFD;
            iocb.aio_resfd = fd as u32;
        }
        iocb
    }
}

/// `struct io_event` from `linux/aio_abi.h`.
#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct IoEvent {
    data: u64,
    obj: u64,
    res: i64,
    res2: i64,
}

impl From<IoEvent> for RawEvent {
    fn from(event: IoEvent) -> Self {
        RawEvent {
            token: event.data,
            res: event.res,
            res2: event.res2,
        }
    }
}

/// Linux native AIO through the raw `io_*` syscalls.
///
/// Control blocks are boxed and kept until their completion is reaped, `io_cancel` finds a
/// request by the address of its control block rather than by its user data.
pub(crate) struct LinuxAio {
    ctx: AioContext,
    in_flight: Mutex<HashMap<u64, Box<Iocb>>>,
    // Completions returned synchronously by io_cancel on older kernels.
    backlog: Mutex<VecDeque<RawEvent>>,
}

impl LinuxAio {
    pub(crate) fn new(entries: usize) -> io::Result<LinuxAio> {
        let mut ctx: AioContext = 0;
        // SAFETY: io_setup only writes the new context id into `ctx`.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_io_setup,
                entries as libc::c_long,
                &mut ctx as *mut AioContext,
            )
        };
        Errno::result(ret)?;

        debug!(ctx, entries, "created linux aio context");
        Ok(LinuxAio {
            ctx,
            in_flight: Mutex::new(HashMap::with_capacity(entries)),
            backlog: Mutex::new(VecDeque::new()),
        })
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<u64, Box<Iocb>>> {
        self.in_flight
            .lock()
            .expect("failed to lock aio control blocks: poisoned")
    }

    fn lock_backlog(&self) -> MutexGuard<'_, VecDeque<RawEvent>> {
        self.backlog
            .lock()
            .expect("failed to lock aio backlog: poisoned")
    }
}

impl Driver for LinuxAio {
    fn submit(&self, batch: &SubmissionBatch) -> io::Result<usize> {
        let mut in_flight = self.lock_in_flight();

        let mut iocbs = Vec::with_capacity(batch.len());
        for request in batch.entries() {
            let mut iocb = Box::new(Iocb::new(request));
            iocbs.push(&mut *iocb as *mut Iocb);
            in_flight.insert(request.token, iocb);
        }

        // SAFETY: every control block is boxed and owned by `in_flight` until reaped, the
        // buffers they point at are borrowed by the owning context.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_io_submit,
                self.ctx,
                iocbs.len() as libc::c_long,
                iocbs.as_mut_ptr(),
            )
        };
        let accepted = match Errno::result(ret) {
            Ok(accepted) => accepted as usize,
            Err(errno) => {
                for request in batch.entries() {
                    in_flight.remove(&request.token);
                }
                return Err(errno.into());
            }
        };

        for request in &batch.entries()[accepted..] {
            in_flight.remove(&request.token);
        }
        Ok(accepted)
    }

    fn poll(
        &self,
        max: usize,
        timeout: Option<Duration>,
        events: &mut Vec<RawEvent>,
    ) -> io::Result<()> {
        let start = events.len();
        {
            let mut backlog = self.lock_backlog();
            while events.len() - start < max {
                match backlog.pop_front() {
                    Some(event) => events.push(event),
                    None => break,
                }
            }
        }

        let wanted = max - (events.len() - start);
        if wanted == 0 {
            return Ok(());
        }

        // Anything from the backlog turns this into a non-blocking reap.
        let timeout = if events.len() > start {
            Some(Duration::ZERO)
        } else {
            timeout
        };
        let spec = timeout.map(|timeout| libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        });
        let spec_ptr = spec
            .as_ref()
            .map_or(std::ptr::null(), |spec| spec as *const libc::timespec);

        let mut reaped = vec![IoEvent::default(); wanted];
        // SAFETY: `reaped` has room for `wanted` events and `spec_ptr` is null or points at a
        // live timespec.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_io_getevents,
                self.ctx,
                1 as libc::c_long,
                wanted as libc::c_long,
                reaped.as_mut_ptr(),
                spec_ptr,
            )
        };
        let count = match Errno::result(ret) {
            Ok(count) => count as usize,
            Err(Errno::EINTR) => 0,
            Err(errno) => return Err(errno.into()),
        };

        let mut in_flight = self.lock_in_flight();
        for event in &reaped[..count] {
            in_flight.remove(&event.data);
            events.push(RawEvent::from(*event));
        }
        Ok(())
    }

    fn cancel(&self, token: u64) -> io::Result<()> {
        let mut in_flight = self.lock_in_flight();
        let iocb = match in_flight.get_mut(&token) {
            Some(iocb) => &mut **iocb as *mut Iocb,
            None => return Err(io::Error::from_raw_os_error(libc::ENOENT)),
        };

        let mut result = IoEvent::default();
        // SAFETY: `iocb` is the exact control block that was submitted and is still owned by
        // `in_flight`.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_io_cancel,
                self.ctx,
                iocb,
                &mut result as *mut IoEvent,
            )
        };
        match Errno::result(ret) {
            // The completion will be posted to the ring like any other.
            Err(Errno::EINPROGRESS) => Ok(()),
            // Older kernels hand the completion back directly.
            Ok(_) => {
                in_flight.remove(&token);
                self.lock_backlog().push_back(RawEvent {
                    token,
                    res: result.res,
                    res2: result.res2,
                });
                Ok(())
            }
            Err(errno) => Err(errno.into()),
        }
    }

    fn name(&self) -> &'static str {
        "linux-aio"
    }
}

impl Drop for LinuxAio {
    fn drop(&mut self) {
        // io_destroy cancels what it can and waits for everything else.
        // SAFETY: the context is owned by this driver and destroyed exactly once.
        let ret = unsafe { libc::syscall(libc::SYS_io_destroy, self.ctx) };
        if let Err(errno) = Errno::result(ret) {
            warn!(ctx = self.ctx, error = %errno, "failed to destroy linux aio context");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use crate::ptr::SendMut;

    use super::*;

    #[test]
    fn test_abi_layout() {
        assert_eq!(mem::size_of::<Iocb>(), 64);
        assert_eq!(mem::size_of::<IoEvent>(), 32);
    }

    #[test]
    fn test_iocb_from_request() {
        let mut buf = [0u8; 512];
        let request = RawRequest {
            token: 0xdead_beef,
            fd: 4,
            op: RawOp::Read {
                buf: unsafe { SendMut::new(buf.as_mut_ptr()) },
                len: 512,
                offset: 1024,
            },
            ioprio: Some((3 << 13) | 2),
            notify: Some(9),
        };

        let iocb = Iocb::new(&request);
        assert_eq!(iocb.aio_data, 0xdead_beef);
        assert_eq!(iocb.aio_lio_opcode, IOCB_CMD_PREAD);
        assert_eq!(iocb.aio_fildes, 4);
        assert_eq!(iocb.aio_buf, buf.as_ptr() as u64);
        assert_eq!(iocb.aio_nbytes, 512);
        assert_eq!(iocb.aio_offset, 1024);
        assert_eq!(iocb.aio_flags, IOCB_FLAG_IOPRIO | IOCB_FLAG_RESFD);
        assert_eq!(iocb.aio_reqprio, (3 << 13) | 2);
        assert_eq!(iocb.aio_resfd, 9);
    }

    #[test]
    fn test_poll_mask_in_buffer_field() {
        let request = RawRequest {
            token: 1,
            fd: 0,
            op: RawOp::Poll {
                events: libc::POLLIN as u32,
            },
            ioprio: None,
            notify: None,
        };

        let iocb = Iocb::new(&request);
        assert_eq!(iocb.aio_lio_opcode, IOCB_CMD_POLL);
        assert_eq!(iocb.aio_buf, libc::POLLIN as u64);
        assert_eq!(iocb.aio_flags, 0);
    }
}
