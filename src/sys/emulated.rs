use std::{
    collections::VecDeque,
    io,
    sync::{Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use nix::{errno::Errno, libc};
use tracing::trace;

use crate::queue::SubmissionBatch;

use super::{Driver, RawEvent, RawOp, RawRequest};

/// How long to sleep between readiness checks while only unready poll requests are queued.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Default)]
struct State {
    queued: VecDeque<RawRequest>,
    completed: VecDeque<RawEvent>,
}

/// An in-process driver that performs every request synchronously with the plain positional
/// I/O syscalls when the reactor polls. It has no kernel requirements, which makes it the
/// driver of choice for tests and for hosts without AIO or io_uring.
///
/// `accept_limit` caps how many entries of a single batch are accepted, to exercise partial
/// acceptance. A batch of which nothing can be accepted fails with `EAGAIN`, like `io_submit`.
pub(crate) struct Emulated {
    state: Mutex<State>,
    ready: Condvar,
    accept_limit: Option<usize>,
}

impl Emulated {
    pub(crate) fn new(accept_limit: Option<usize>) -> Emulated {
        Emulated {
            state: Mutex::new(State::default()),
            ready: Condvar::new(),
            accept_limit,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .expect("failed to lock emulated driver: poisoned")
    }

    /// Run everything that can make progress, leaving unready poll requests queued.
    fn run_queued(state: &mut State) {
        let mut waiting = VecDeque::with_capacity(state.queued.len());
        while let Some(request) = state.queued.pop_front() {
            match execute(&request) {
                Some(res) => {
                    trace!(token = request.token, res, "emulated request finished");
                    signal(request.notify);
                    state.completed.push_back(RawEvent {
                        token: request.token,
                        res,
                        res2: 0,
                    });
                }
                None => waiting.push_back(request),
            }
        }
        state.queued = waiting;
    }
}

/// Perform `request`, returning its result in kernel form, or `None` for a poll request whose
/// events are not ready yet.
fn execute(request: &RawRequest) -> Option<i64> {
    let fd = request.fd;
    // SAFETY: every pointer in the request refers to a buffer borrowed by the owning context for
    // as long as the request is queued.
    let ret = unsafe {
        match request.op {
            RawOp::Read { buf, len, offset } => libc::pread(
                fd,
                buf.to_ptr() as *mut libc::c_void,
                len,
                offset as libc::off_t,
            ) as i64,
            RawOp::Write { buf, len, offset } => libc::pwrite(
                fd,
                buf.to_ptr() as *const libc::c_void,
                len,
                offset as libc::off_t,
            ) as i64,
            RawOp::ReadV { iov, count, offset } => {
                libc::preadv(fd, iov.to_ptr(), count as libc::c_int, offset as libc::off_t) as i64
            }
            RawOp::WriteV { iov, count, offset } => {
                libc::pwritev(fd, iov.to_ptr(), count as libc::c_int, offset as libc::off_t) as i64
            }
            RawOp::Fsync => libc::fsync(fd) as i64,
            RawOp::Fdatasync => libc::fdatasync(fd) as i64,
            RawOp::Poll { events } => {
                let mut pfd = libc::pollfd {
                    fd,
                    events: events as libc::c_short,
                    revents: 0,
                };
                match libc::poll(&mut pfd, 1, 0) {
                    0 => return None,
                    ret if ret < 0 => ret as i64,
                    _ if pfd.revents & libc::POLLNVAL != 0 => return Some(-(libc::EBADF as i64)),
                    _ => return Some(pfd.revents as u16 as i64),
                }
            }
        }
    };

    if ret < 0 {
        Some(-(Errno::last() as i64))
    } else {
        Some(ret)
    }
}

/// Bump the eventfd attached to a request, if any.
fn signal(notify: Option<libc::c_int>) {
    if let Some(fd) = notify {
        let one: u64 = 1;
        // SAFETY: writes eight bytes from a live u64.
        let ret = unsafe {
            libc::write(
                fd,
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            trace!(fd, error = %Errno::last(), "failed to signal notification descriptor");
        }
    }
}

impl Driver for Emulated {
    fn submit(&self, batch: &SubmissionBatch) -> io::Result<usize> {
        let accepted = self
            .accept_limit
            .map_or(batch.len(), |limit| limit.min(batch.len()));
        if accepted == 0 && !batch.is_empty() {
            return Err(io::Error::from_raw_os_error(libc::EAGAIN));
        }

        let mut state = self.lock_state();
        state
            .queued
            .extend(batch.entries()[..accepted].iter().copied());
        self.ready.notify_all();
        Ok(accepted)
    }

    fn poll(
        &self,
        max: usize,
        timeout: Option<Duration>,
        events: &mut Vec<RawEvent>,
    ) -> io::Result<()> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.lock_state();
        loop {
            Emulated::run_queued(&mut state);

            let take = max.min(state.completed.len());
            if take > 0 {
                events.extend(state.completed.drain(..take));
                return Ok(());
            }

            let left = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Ok(());
                    }
                    Some(left)
                }
                None => None,
            };

            // Unready poll requests have to be checked again, nothing else changes until the
            // next submit or cancel.
            let wait = match (state.queued.is_empty(), left) {
                (false, Some(left)) => Some(left.min(POLL_INTERVAL)),
                (false, None) => Some(POLL_INTERVAL),
                (true, left) => left,
            };
            state = match wait {
                Some(wait) => {
                    self.ready
                        .wait_timeout(state, wait)
                        .expect("failed to wait on emulated driver: poisoned")
                        .0
                }
                None => self
                    .ready
                    .wait(state)
                    .expect("failed to wait on emulated driver: poisoned"),
            };
        }
    }

    fn cancel(&self, token: u64) -> io::Result<()> {
        let mut state = self.lock_state();
        let position = state
            .queued
            .iter()
            .position(|request| request.token == token)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;

        if let Some(request) = state.queued.remove(position) {
            signal(request.notify);
            state.completed.push_back(RawEvent {
                token,
                res: -(libc::ECANCELED as i64),
                res2: 0,
            });
            self.ready.notify_all();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "emulated"
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, os::fd::AsRawFd, os::unix::net::UnixStream};

    use crate::ptr::{SendConst, SendMut};

    use super::*;

    fn batch(requests: &[RawRequest]) -> SubmissionBatch {
        let mut batch = SubmissionBatch::with_capacity(requests.len());
        for request in requests {
            batch.push(*request);
        }
        batch
    }

    fn fsync(token: u64, fd: i32) -> RawRequest {
        RawRequest {
            token,
            fd,
            op: RawOp::Fsync,
            ioprio: None,
            notify: None,
        }
    }

    #[test]
    fn test_accept_limit() {
        let driver = Emulated::new(Some(2));
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();

        let accepted = driver
            .submit(&batch(&[fsync(1, fd), fsync(2, fd), fsync(3, fd)]))
            .unwrap();
        assert_eq!(accepted, 2);

        let mut events = Vec::new();
        driver
            .poll(8, Some(Duration::ZERO), &mut events)
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.res == 0));
    }

    #[test]
    fn test_nothing_accepted_is_eagain() {
        let driver = Emulated::new(Some(0));
        let err = driver.submit(&batch(&[fsync(1, 0)])).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EAGAIN));
    }

    #[test]
    fn test_read_and_write() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"hello world").unwrap();
        let fd = file.as_raw_fd();

        let driver = Emulated::new(None);
        let data = *b"HELLO";
        let mut out = [0u8; 11];
        let write = RawRequest {
            token: 1,
            fd,
            op: RawOp::Write {
                buf: unsafe { SendConst::new(data.as_ptr()) },
                len: data.len(),
                offset: 0,
            },
            ioprio: None,
            notify: None,
        };
        let read = RawRequest {
            token: 2,
            fd,
            op: RawOp::Read {
                buf: unsafe { SendMut::new(out.as_mut_ptr()) },
                len: out.len(),
                offset: 0,
            },
            ioprio: None,
            notify: None,
        };

        assert_eq!(driver.submit(&batch(&[write, read])).unwrap(), 2);
        let mut events = Vec::new();
        driver.poll(8, None, &mut events).unwrap();

        assert_eq!(
            events,
            vec![
                RawEvent {
                    token: 1,
                    res: 5,
                    res2: 0
                },
                RawEvent {
                    token: 2,
                    res: 11,
                    res2: 0
                },
            ]
        );
        assert_eq!(&out, b"HELLO world");
    }

    #[test]
    fn test_bad_descriptor_fails_at_completion() {
        let driver = Emulated::new(None);
        driver.submit(&batch(&[fsync(7, -1)])).unwrap();

        let mut events = Vec::new();
        driver
            .poll(1, Some(Duration::ZERO), &mut events)
            .unwrap();
        assert_eq!(events[0].res, -(libc::EBADF as i64));
    }

    #[test]
    fn test_cancel_queued_poll() {
        let (reader, _writer) = UnixStream::pair().unwrap();
        let driver = Emulated::new(None);
        let poll = RawRequest {
            token: 5,
            fd: reader.as_raw_fd(),
            op: RawOp::Poll {
                events: libc::POLLIN as u32,
            },
            ioprio: None,
            notify: None,
        };
        driver.submit(&batch(&[poll])).unwrap();

        let mut events = Vec::new();
        driver
            .poll(1, Some(Duration::from_millis(5)), &mut events)
            .unwrap();
        assert!(events.is_empty());

        driver.cancel(5).unwrap();
        assert_eq!(
            driver.cancel(5).unwrap_err().raw_os_error(),
            Some(libc::ENOENT)
        );

        driver
            .poll(1, Some(Duration::ZERO), &mut events)
            .unwrap();
        assert_eq!(events[0].res, -(libc::ECANCELED as i64));
    }

    #[test]
    fn test_zero_timeout_does_not_block() {
        let driver = Emulated::new(None);
        let mut events = Vec::new();
        let start = Instant::now();
        driver
            .poll(4, Some(Duration::ZERO), &mut events)
            .unwrap();
        assert!(events.is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
