use std::{
    fmt,
    io::{IoSlice, IoSliceMut},
    os::fd::RawFd,
};

use nix::poll::PollFlags;

use crate::{
    queue::CorrelationKey,
    reactor::{CompletionEvent, Continuation},
    sync::Completion,
    sys::{RawOp, RawRequest},
};

use super::{
    buffer::RawBuffer, Buffer, Error, Kind, Priority, PriorityClass, Result, State, Tracker,
};

/// The operation of a descriptor together with the fields that only exist for it. Sync and poll
/// requests have nowhere to store a buffer, length or offset.
enum Op<'buf> {
    Transfer {
        kind: Kind,
        buf: Buffer<'buf>,
        len: usize,
        offset: u64,
    },
    Fsync,
    Fdatasync,
    Poll {
        events: PollFlags,
    },
}

impl<'buf> Op<'buf> {
    fn new(
        kind: Kind,
        buffer: Option<Buffer<'buf>>,
        length: Option<usize>,
        offset: Option<u64>,
    ) -> Result<Op<'buf>> {
        if !kind.is_transfer() {
            if buffer.is_some() {
                return Err(Error::InvalidArgument(
                    "sync and poll requests do not take a buffer",
                ));
            }
            if length.unwrap_or(0) != 0 {
                return Err(Error::InvalidArgument(
                    "sync and poll requests do not take a length",
                ));
            }
            if offset.unwrap_or(0) != 0 {
                return Err(Error::InvalidArgument(
                    "sync and poll requests do not take an offset",
                ));
            }
            return Ok(match kind {
                Kind::Fsync => Op::Fsync,
                Kind::Fdatasync => Op::Fdatasync,
                _ => Op::Poll {
                    events: PollFlags::POLLIN,
                },
            });
        }

        let buf = buffer.ok_or(Error::InvalidArgument(
            "read and write requests require a buffer",
        ))?;
        if kind.is_vectored() && !buf.is_vectored() {
            return Err(Error::InvalidArgument(
                "vectored requests require a vectored buffer",
            ));
        }
        if !kind.is_vectored() && buf.is_vectored() {
            return Err(Error::InvalidArgument(
                "contiguous requests require a contiguous buffer",
            ));
        }
        if kind.is_read() && !buf.is_mutable() {
            return Err(Error::InvalidArgument(
                "read requests require a mutable buffer",
            ));
        }

        let available = buf.len();
        let len = length.unwrap_or(available);
        if len > available {
            return Err(Error::InvalidArgument("length exceeds the buffer size"));
        }
        if kind.is_vectored() && len != available {
            return Err(Error::InvalidArgument(
                "vectored requests always transfer the whole buffer",
            ));
        }

        let offset = offset.unwrap_or(0);
        if offset > i64::MAX as u64 {
            return Err(Error::InvalidArgument(
                "offset exceeds the largest file offset",
            ));
        }

        Ok(Op::Transfer {
            kind,
            buf,
            len,
            offset,
        })
    }

    fn kind(&self) -> Kind {
        match self {
            Op::Transfer { kind, .. } => *kind,
            Op::Fsync => Kind::Fsync,
            Op::Fdatasync => Kind::Fdatasync,
            Op::Poll { .. } => Kind::Poll,
        }
    }
}

/// The description of a single asynchronous I/O operation, bound to a file descriptor and a
/// borrowed buffer.
///
/// A descriptor starts out [State::Pending]. Once a [crate::SubmissionQueue] accepts it the
/// descriptor becomes [State::Submitted] and is frozen: its kind, buffer and priority can no
/// longer be changed and [RequestDescriptor::buffer] stops handing out the buffer until the
/// completion is dispatched. The caller keeps the descriptor the whole time, the reactor only
/// needs its correlation key to route the completion back.
///
/// ```no_run
/// use std::{fs::File, os::fd::AsRawFd};
///
/// use libaio::{Context, RequestDescriptor};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let file = File::open("/etc/hostname")?;
/// let mut buf = vec![0u8; 4096];
///
/// let ctx = Context::builder().build()?;
/// let mut read = RequestDescriptor::read(file.as_raw_fd(), &mut buf, 0)?;
/// read.then(|event| println!("read finished: {:?}", event.outcome()))?;
///
/// ctx.queue().submit(std::slice::from_mut(&mut read))?;
/// while ctx.queue().in_flight() > 0 {
///     ctx.reactor().run_once(16, None)?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct RequestDescriptor<'buf> {
    fd: RawFd,
    op: Op<'buf>,
    priority: Priority,
    notify: Option<RawFd>,
    continuation: Continuation<'buf>,
    tracker: Tracker,
}

impl<'buf> RequestDescriptor<'buf> {
    /// Start building a descriptor of the given kind against `fd`. The file descriptor is not
    /// checked with the OS until submission.
    pub fn builder(kind: Kind, fd: RawFd) -> DescriptorBuilder<'buf> {
        DescriptorBuilder::new(kind, fd)
    }

    /// Build a descriptor in one call. `length` defaults to the full buffer and `offset` to 0.
    pub fn create(
        kind: Kind,
        fd: RawFd,
        buffer: Option<Buffer<'buf>>,
        length: Option<usize>,
        offset: Option<u64>,
    ) -> Result<RequestDescriptor<'buf>> {
        let mut builder = DescriptorBuilder::new(kind, fd);
        builder.buffer = buffer;
        builder.length = length;
        builder.offset = offset;
        builder.build()
    }

    /// Read up to `buf.len()` bytes from `fd` at `offset`.
    pub fn read(fd: RawFd, buf: &'buf mut [u8], offset: u64) -> Result<RequestDescriptor<'buf>> {
        Self::builder(Kind::Read, fd)
            .buffer(buf)
            .offset(offset)
            .build()
    }

    /// Write all of `buf` to `fd` at `offset`.
    pub fn write(fd: RawFd, buf: &'buf [u8], offset: u64) -> Result<RequestDescriptor<'buf>> {
        Self::builder(Kind::Write, fd)
            .buffer(buf)
            .offset(offset)
            .build()
    }

    /// Scatter read into `bufs` starting at `offset`.
    pub fn readv(
        fd: RawFd,
        bufs: &'buf mut [IoSliceMut<'buf>],
        offset: u64,
    ) -> Result<RequestDescriptor<'buf>> {
        Self::builder(Kind::ReadV, fd)
            .buffer(bufs)
            .offset(offset)
            .build()
    }

    /// Gather write from `bufs` starting at `offset`.
    pub fn writev(
        fd: RawFd,
        bufs: &'buf [IoSlice<'buf>],
        offset: u64,
    ) -> Result<RequestDescriptor<'buf>> {
        Self::builder(Kind::WriteV, fd)
            .buffer(bufs)
            .offset(offset)
            .build()
    }

    pub fn fsync(fd: RawFd) -> Result<RequestDescriptor<'buf>> {
        Self::builder(Kind::Fsync, fd).build()
    }

    pub fn fdatasync(fd: RawFd) -> Result<RequestDescriptor<'buf>> {
        Self::builder(Kind::Fdatasync, fd).build()
    }

    /// Wait for any of `events` to become ready on `fd`.
    pub fn poll(fd: RawFd, events: PollFlags) -> Result<RequestDescriptor<'buf>> {
        Self::builder(Kind::Poll, fd).poll_events(events).build()
    }

    pub fn kind(&self) -> Kind {
        self.op.kind()
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// A read-only view of the buffer. Always `None` for sync and poll requests, and `None` while
    /// the request is in flight since the driver may be writing into it.
    pub fn buffer(&self) -> Option<&Buffer<'buf>> {
        match &self.op {
            Op::Transfer { buf, .. } if self.state() != State::Submitted => Some(buf),
            _ => None,
        }
    }

    /// Number of bytes to transfer, 0 for sync and poll requests.
    pub fn length(&self) -> usize {
        match &self.op {
            Op::Transfer { len, .. } => *len,
            _ => 0,
        }
    }

    /// File offset of the transfer, 0 for sync and poll requests.
    pub fn offset(&self) -> u64 {
        match &self.op {
            Op::Transfer { offset, .. } => *offset,
            _ => 0,
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn priority_class(&self) -> PriorityClass {
        self.priority.class()
    }

    pub fn priority_value(&self) -> u8 {
        self.priority.value()
    }

    /// The eventfd signalled on completion in addition to the regular completion event.
    pub fn notify(&self) -> Option<RawFd> {
        self.notify
    }

    /// The requested poll events, only set for [Kind::Poll].
    pub fn poll_events(&self) -> Option<PollFlags> {
        match &self.op {
            Op::Poll { events } => Some(*events),
            _ => None,
        }
    }

    pub fn state(&self) -> State {
        self.tracker.state()
    }

    /// The correlation key assigned by the last successful submission.
    pub fn key(&self) -> Option<CorrelationKey> {
        self.tracker.key()
    }

    /// The completion event of the last submission, once it has been dispatched.
    pub fn outcome(&self) -> Option<CompletionEvent> {
        self.tracker.outcome()
    }

    /// Change the priority of a descriptor that has not been submitted yet.
    pub fn set_priority(&mut self, priority: Priority) -> Result<()> {
        self.ensure_pending()?;
        self.priority = priority;
        Ok(())
    }

    /// Run `f` with the completion event when the reactor dispatches it. Replaces any previously
    /// attached continuation.
    pub fn then<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&CompletionEvent) + Send + 'buf,
    {
        self.ensure_pending()?;
        self.continuation = Continuation::Callback(Box::new(f));
        Ok(())
    }

    /// Return a [Completion] future that resolves once the reactor dispatches this request.
    /// Replaces any previously attached continuation. The future does not drive the reactor, the
    /// caller's poll loop still has to.
    pub fn completion(&mut self) -> Result<Completion> {
        self.ensure_pending()?;
        let (continuation, completion) = Continuation::notify();
        self.continuation = continuation;
        Ok(completion)
    }

    /// Retarget this descriptor to `kind`, keeping its identity, file descriptor, priority and
    /// continuation. Moving to a sync or poll kind drops the buffer, moving between transfer
    /// kinds keeps it as long as the vector-ness matches and a read still gets a mutable buffer.
    pub fn change_kind(self, kind: Kind) -> Result<RequestDescriptor<'buf>> {
        self.ensure_pending()?;
        let from = self.kind();
        if from == kind {
            return Ok(self);
        }

        let RequestDescriptor {
            fd,
            op,
            priority,
            notify,
            continuation,
            tracker,
        } = self;

        let op = match op {
            Op::Transfer {
                buf, len, offset, ..
            } if kind.is_transfer() => {
                if kind.is_vectored() != buf.is_vectored() || (kind.is_read() && !buf.is_mutable())
                {
                    return Err(Error::IncompatibleKindChange { from, to: kind });
                }
                Op::Transfer {
                    kind,
                    buf,
                    len,
                    offset,
                }
            }
            _ if kind.is_transfer() => {
                return Err(Error::IncompatibleKindChange { from, to: kind });
            }
            _ => Op::new(kind, None, None, None)?,
        };

        Ok(RequestDescriptor {
            fd,
            op,
            priority,
            notify,
            continuation,
            tracker,
        })
    }

    /// Retarget this descriptor to `kind` with a fresh buffer, validated exactly as at
    /// construction.
    pub fn change_kind_with(
        self,
        kind: Kind,
        buffer: impl Into<Buffer<'buf>>,
        length: Option<usize>,
        offset: Option<u64>,
    ) -> Result<RequestDescriptor<'buf>> {
        self.ensure_pending()?;
        let op = Op::new(kind, Some(buffer.into()), length, offset)?;
        Ok(RequestDescriptor { op, ..self })
    }

    /// Make a completed or cancelled descriptor submittable again. Its last correlation key is
    /// kept until the next submission assigns a new one.
    pub fn reset(&mut self) -> Result<()> {
        if self.tracker.reset() {
            Ok(())
        } else {
            Err(Error::AlreadySubmitted)
        }
    }

    fn ensure_pending(&self) -> Result<()> {
        match self.state() {
            State::Pending => Ok(()),
            _ => Err(Error::AlreadySubmitted),
        }
    }

    pub(crate) fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub(crate) fn take_continuation(&mut self) -> Continuation<'buf> {
        std::mem::take(&mut self.continuation)
    }

    /// Lower this descriptor into the form the drivers submit, tagged with `token`.
    pub(crate) fn as_raw(&mut self, token: u64) -> RawRequest {
        let op = match &mut self.op {
            Op::Transfer {
                kind,
                buf,
                len,
                offset,
            } => {
                let (len, offset) = (*len, *offset);
                match (*kind, buf.as_raw()) {
                    (Kind::Read, RawBuffer::Mut(buf)) => RawOp::Read { buf, len, offset },
                    (Kind::Write, RawBuffer::Mut(buf)) => RawOp::Write {
                        buf: buf.into(),
                        len,
                        offset,
                    },
                    (Kind::Write, RawBuffer::Const(buf)) => RawOp::Write { buf, len, offset },
                    (Kind::ReadV, RawBuffer::Vectored(iov, count)) => {
                        RawOp::ReadV { iov, count, offset }
                    }
                    (Kind::WriteV, RawBuffer::Vectored(iov, count)) => {
                        RawOp::WriteV { iov, count, offset }
                    }
                    _ => unreachable!("request kind and buffer are validated at construction"),
                }
            }
            Op::Fsync => RawOp::Fsync,
            Op::Fdatasync => RawOp::Fdatasync,
            Op::Poll { events } => RawOp::Poll {
                events: events.bits() as u16 as u32,
            },
        };

        RawRequest {
            token,
            fd: self.fd,
            op,
            ioprio: self.priority.to_ioprio(),
            notify: self.notify,
        }
    }
}

impl<'buf> fmt::Debug for RequestDescriptor<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("kind", &self.kind())
            .field("fd", &self.fd)
            .field("length", &self.length())
            .field("offset", &self.offset())
            .field("priority", &self.priority)
            .field("notify", &self.notify)
            .field("state", &self.state())
            .field("key", &self.key())
            .finish()
    }
}

/// Builder for [RequestDescriptor], every setter is optional and validation happens in
/// [DescriptorBuilder::build].
pub struct DescriptorBuilder<'buf> {
    kind: Kind,
    fd: RawFd,
    buffer: Option<Buffer<'buf>>,
    length: Option<usize>,
    offset: Option<u64>,
    priority: (PriorityClass, u8),
    notify: Option<RawFd>,
    poll_events: Option<PollFlags>,
}

impl<'buf> DescriptorBuilder<'buf> {
    fn new(kind: Kind, fd: RawFd) -> DescriptorBuilder<'buf> {
        DescriptorBuilder {
            kind,
            fd,
            buffer: None,
            length: None,
            offset: None,
            priority: (PriorityClass::None, 0),
            notify: None,
            poll_events: None,
        }
    }

    pub fn buffer(mut self, buffer: impl Into<Buffer<'buf>>) -> Self {
        self.buffer = Some(buffer.into());
        self
    }

    /// Transfer only the first `length` bytes of a contiguous buffer.
    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn priority(mut self, class: PriorityClass, value: u8) -> Self {
        self.priority = (class, value);
        self
    }

    /// Signal this eventfd when the request completes.
    pub fn notify(mut self, fd: RawFd) -> Self {
        self.notify = Some(fd);
        self
    }

    /// The events a [Kind::Poll] request waits for, defaults to `POLLIN`.
    pub fn poll_events(mut self, events: PollFlags) -> Self {
        self.poll_events = Some(events);
        self
    }

    pub fn build(self) -> Result<RequestDescriptor<'buf>> {
        if self.fd < 0 {
            return Err(Error::InvalidArgument("file descriptor must not be negative"));
        }
        if matches!(self.notify, Some(fd) if fd < 0) {
            return Err(Error::InvalidArgument(
                "notification descriptor must not be negative",
            ));
        }

        let priority = Priority::new(self.priority.0, self.priority.1)?;
        let mut op = Op::new(self.kind, self.buffer, self.length, self.offset)?;
        match (&mut op, self.poll_events) {
            (Op::Poll { events }, Some(requested)) => *events = requested,
            (_, Some(_)) => {
                return Err(Error::InvalidArgument(
                    "poll events are only valid for poll requests",
                ))
            }
            _ => {}
        }

        Ok(RequestDescriptor {
            fd: self.fd,
            op,
            priority,
            notify: self.notify,
            continuation: Continuation::default(),
            tracker: Tracker::new(),
        })
    }
}
