//! Round trips through the kernel drivers. Every test skips itself when the host does not offer
//! the interface, for instance inside containers that block `io_setup` or `io_uring_setup`.

mod common;

use std::{os::fd::AsRawFd, slice};

use libaio::{Context, DriverKind, Kind, PriorityClass, RequestDescriptor, State, SubmissionError};

use common::{drain, init_logging};

fn open<'buf>(driver: DriverKind) -> Option<Context<'buf>> {
    init_logging();
    match Context::builder()
        .driver(driver)
        .max_in_flight(32)
        .strict(false)
        .build()
    {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            eprintln!("skipping, {driver} is unavailable: {err}");
            None
        }
    }
}

fn write_then_read(driver: DriverKind) {
    let file = tempfile::tempfile().unwrap();
    let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    let mut out = vec![0u8; 4096];

    {
        let Some(ctx) = open(driver) else { return };

        let mut write = RequestDescriptor::builder(Kind::Write, file.as_raw_fd())
            .buffer(&data[..])
            .priority(PriorityClass::BestEffort, 4)
            .build()
            .unwrap();
        let mut sync = RequestDescriptor::fsync(file.as_raw_fd()).unwrap();

        assert_eq!(ctx.queue().submit(slice::from_mut(&mut write)).unwrap(), 1);
        drain(&ctx);
        assert_eq!(write.outcome().unwrap().outcome().unwrap(), 4096);

        ctx.queue().submit(slice::from_mut(&mut sync)).unwrap();
        drain(&ctx);
        assert_eq!(sync.state(), State::Completed);

        let mut read = RequestDescriptor::read(file.as_raw_fd(), &mut out, 0).unwrap();
        ctx.queue().submit(slice::from_mut(&mut read)).unwrap();
        drain(&ctx);
        assert_eq!(read.outcome().unwrap().outcome().unwrap(), 4096);
        assert_eq!(ctx.stats().completed, 3);
    }

    assert_eq!(out, data);
}

#[test]
fn test_linux_aio_round_trip() {
    write_then_read(DriverKind::LinuxAio);
}

#[test]
fn test_io_uring_round_trip() {
    write_then_read(DriverKind::IoUring);
}

#[test]
fn test_io_uring_rejects_notification_handles() {
    let file = tempfile::tempfile().unwrap();
    let Some(ctx) = open(DriverKind::IoUring) else {
        return;
    };

    let mut sync = RequestDescriptor::builder(Kind::Fsync, file.as_raw_fd())
        .notify(file.as_raw_fd())
        .build()
        .unwrap();
    assert!(matches!(
        ctx.queue().submit(slice::from_mut(&mut sync)),
        Err(SubmissionError::Unsupported(_))
    ));
    assert_eq!(sync.state(), State::Pending);
    assert_eq!(ctx.queue().in_flight(), 0);
}
