use std::{
    collections::VecDeque,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

use io_uring::{
    opcode, squeue,
    types::{self, CancelBuilder, FsyncFlags, SubmitArgs, Timespec},
    IoUring,
};
use nix::libc;
use tracing::{debug, warn};

use crate::queue::SubmissionBatch;

use super::{Driver, RawEvent, RawOp, RawRequest};

/// User data of the cancel entries we push, their completions are never reported.
const CANCEL_TOKEN: u64 = u64::MAX;

/// Upper bound of a single wait on the ring, so submitters and cancels are never locked out for
/// longer than this.
const WAIT_SLICE: Duration = Duration::from_millis(100);

struct Ring {
    ring: IoUring,
    // Cancel entries that did not fit in the submission queue.
    backlog: VecDeque<squeue::Entry>,
}

impl Ring {
    fn submit(&mut self) -> io::Result<()> {
        match self.ring.submit() {
            Ok(_) => Ok(()),
            Err(err) => match err.raw_os_error() {
                Some(libc::EBUSY) | Some(libc::EINTR) => Ok(()),
                _ => Err(err),
            },
        }
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<()> {
        let spec = Timespec::new()
            .sec(timeout.as_secs())
            .nsec(timeout.subsec_nanos());
        let args = SubmitArgs::new().timespec(&spec);
        match self.ring.submitter().submit_with_args(1, &args) {
            Ok(_) => Ok(()),
            Err(err) => match err.raw_os_error() {
                Some(libc::EBUSY) | Some(libc::ETIME) | Some(libc::EINTR) => Ok(()),
                _ => Err(err),
            },
        }
    }

    fn clear_backlog(&mut self) {
        let mut sq = self.ring.submission();
        while let Some(entry) = self.backlog.pop_front() {
            // SAFETY: cancel entries reference no memory.
            if unsafe { sq.push(&entry) }.is_err() {
                self.backlog.push_front(entry);
                break;
            }
        }
    }
}

/// A driver backed by a single `io_uring` instance.
pub(crate) struct Uring {
    ring: Mutex<Ring>,
    outstanding: AtomicUsize,
}

impl Uring {
    pub(crate) fn new(entries: usize) -> io::Result<Uring> {
        let entries = entries.clamp(1, u32::MAX as usize) as u32;
        let ring = IoUring::builder().build(entries)?;

        debug!(entries, "created io_uring instance");
        Ok(Uring {
            ring: Mutex::new(Ring {
                ring,
                backlog: VecDeque::new(),
            }),
            outstanding: AtomicUsize::new(0),
        })
    }

    fn lock_ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().expect("failed to lock io_uring: poisoned")
    }

    fn reap(&self, ring: &mut Ring, max: usize, events: &mut Vec<RawEvent>) -> usize {
        let mut reaped = 0;
        for cqe in ring.ring.completion() {
            if cqe.user_data() == CANCEL_TOKEN {
                continue;
            }
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            events.push(RawEvent {
                token: cqe.user_data(),
                res: cqe.result() as i64,
                res2: cqe.flags() as i64,
            });
            reaped += 1;
            if reaped == max {
                break;
            }
        }
        reaped
    }
}

fn build_entry(request: &RawRequest) -> squeue::Entry {
    let fd = types::Fd(request.fd);
    let ioprio = request.ioprio.unwrap_or(0);
    let entry = match request.op {
        RawOp::Read { buf, len, offset } => opcode::Read::new(fd, buf.to_ptr(), len as u32)
            .offset(offset)
            .ioprio(ioprio)
            .build(),
        RawOp::Write { buf, len, offset } => opcode::Write::new(fd, buf.to_ptr(), len as u32)
            .offset(offset)
            .ioprio(ioprio)
            .build(),
        RawOp::ReadV { iov, count, offset } => {
            opcode::Readv::new(fd, iov.to_ptr(), count as u32)
                .offset(offset)
                .ioprio(ioprio)
                .build()
        }
        RawOp::WriteV { iov, count, offset } => {
            opcode::Writev::new(fd, iov.to_ptr(), count as u32)
                .offset(offset)
                .ioprio(ioprio)
                .build()
        }
        RawOp::Fsync => opcode::Fsync::new(fd).build(),
        RawOp::Fdatasync => opcode::Fsync::new(fd)
            .flags(FsyncFlags::DATASYNC)
            .build(),
        RawOp::Poll { events } => opcode::PollAdd::new(fd, events).build(),
    };
    entry.user_data(request.token)
}

impl Driver for Uring {
    fn validate(&self, request: &RawRequest) -> Result<(), &'static str> {
        if request.notify.is_some() {
            return Err("per-request notification handles");
        }
        match request.op {
            RawOp::Read { len, .. } | RawOp::Write { len, .. } if len > u32::MAX as usize => {
                Err("transfers larger than 4GiB")
            }
            RawOp::ReadV { count, .. } | RawOp::WriteV { count, .. }
                if count > u32::MAX as usize =>
            {
                Err("more than 2^32 vector segments")
            }
            _ => Ok(()),
        }
    }

    fn submit(&self, batch: &SubmissionBatch) -> io::Result<usize> {
        let mut ring = self.lock_ring();

        let mut pushed = 0;
        {
            let mut sq = ring.ring.submission();
            for request in batch.entries() {
                let entry = build_entry(request);
                // SAFETY: the buffers behind the entry are borrowed by the owning context until
                // the completion has been reaped.
                if unsafe { sq.push(&entry) }.is_err() {
                    break;
                }
                pushed += 1;
            }
        }
        if pushed == 0 {
            return Err(io::Error::from_raw_os_error(libc::EAGAIN));
        }
        self.outstanding.fetch_add(pushed, Ordering::AcqRel);

        // Entries in the submission queue are consumed by the next enter no matter what, so
        // they count as accepted even if this one fails.
        if let Err(err) = ring.submit() {
            warn!(pushed, error = %err, "io_uring enter failed, entries stay queued");
        }
        Ok(pushed)
    }

    fn poll(
        &self,
        max: usize,
        timeout: Option<Duration>,
        events: &mut Vec<RawEvent>,
    ) -> io::Result<()> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let mut ring = self.lock_ring();
            ring.clear_backlog();
            if self.reap(&mut ring, max, events) > 0 {
                return Ok(());
            }

            let wait = match deadline {
                None => WAIT_SLICE,
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        ring.submit()?;
                        self.reap(&mut ring, max, events);
                        return Ok(());
                    }
                    left.min(WAIT_SLICE)
                }
            };

            ring.wait(wait)?;
            if self.reap(&mut ring, max, events) > 0 {
                return Ok(());
            }
        }
    }

    fn cancel(&self, token: u64) -> io::Result<()> {
        let entry = opcode::AsyncCancel2::new(CancelBuilder::user_data(token).all())
            .build()
            .user_data(CANCEL_TOKEN);

        let mut ring = self.lock_ring();
        // SAFETY: cancel entries reference no memory.
        if unsafe { ring.ring.submission().push(&entry) }.is_err() {
            ring.backlog.push_back(entry);
            return Ok(());
        }
        ring.submit()
    }

    fn name(&self) -> &'static str {
        "io_uring"
    }
}

impl Drop for Uring {
    fn drop(&mut self) {
        let outstanding = *self.outstanding.get_mut();
        if outstanding == 0 {
            return;
        }

        debug!(outstanding, "draining io_uring before teardown");
        let ring = match self.ring.get_mut() {
            Ok(ring) => ring,
            Err(poisoned) => poisoned.into_inner(),
        };
        ring.backlog.clear();

        let cancel = opcode::AsyncCancel2::new(CancelBuilder::any())
            .build()
            .user_data(CANCEL_TOKEN);
        // SAFETY: cancel entries reference no memory.
        while unsafe { ring.ring.submission().push(&cancel) }.is_err() {
            if let Err(err) = ring.submit() {
                warn!(error = %err, "failed to flush io_uring while draining");
                break;
            }
        }

        // The kernel must be done with every buffer before the borrows are released.
        let mut remaining = outstanding;
        while remaining > 0 {
            if let Err(err) = ring.ring.submit_and_wait(1) {
                if !matches!(err.raw_os_error(), Some(libc::EINTR) | Some(libc::EBUSY)) {
                    warn!(remaining, error = %err, "failed to drain io_uring");
                    break;
                }
            }
            for cqe in ring.ring.completion() {
                if cqe.user_data() != CANCEL_TOKEN {
                    remaining = remaining.saturating_sub(1);
                }
            }
        }
    }
}
