//! Copy a file with a bounded number of requests in flight.
//!
//! ```text
//! cargo run --example copy -- <source> <destination> [aio|uring|emulated]
//! ```

use std::{
    env,
    error::Error,
    fs::File,
    os::fd::AsRawFd,
    time::{Duration, Instant},
};

use libaio::{Context, DriverKind, RequestDescriptor, SubmissionError};
use nix::libc;
use tracing::info;

const CHUNK: usize = 64 * 1024;
const QUEUE_DEPTH: usize = 32;

/// Submit every descriptor, keeping at most the queue depth in flight, and wait for all of them.
fn run_all<'buf>(
    ctx: &Context<'buf>,
    descs: &mut [RequestDescriptor<'buf>],
) -> Result<(), Box<dyn Error>> {
    let mut next = 0;
    while next < descs.len() || ctx.queue().in_flight() > 0 {
        if next < descs.len() {
            match ctx.queue().submit(&mut descs[next..]) {
                Ok(accepted) => next += accepted,
                Err(SubmissionError::QueueFull { .. }) => {}
                Err(err) if err.raw_os_error() == Some(libc::EAGAIN) => {}
                Err(err) => return Err(err.into()),
            }
        }
        ctx.reactor()
            .run_once(QUEUE_DEPTH, Some(Duration::from_millis(10)))?;
    }

    for desc in descs.iter() {
        let event = desc.outcome().ok_or("request was never dispatched")?;
        let transferred = event.outcome()?;
        if transferred != desc.length() {
            return Err(format!(
                "short transfer at offset {}: {transferred} of {} bytes",
                desc.offset(),
                desc.length()
            )
            .into());
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().init();

    let mut args = env::args().skip(1);
    let usage = "usage: copy <source> <destination> [aio|uring|emulated]";
    let src = File::open(args.next().ok_or(usage)?)?;
    let dst = File::create(args.next().ok_or(usage)?)?;
    let driver = match args.next().as_deref() {
        None | Some("aio") => DriverKind::LinuxAio,
        Some("uring") => DriverKind::IoUring,
        Some("emulated") => DriverKind::Emulated,
        Some(other) => return Err(format!("unknown driver {other}, {usage}").into()),
    };

    let len = src.metadata()?.len() as usize;
    let mut buf = vec![0u8; len];
    let start = Instant::now();

    {
        let ctx = Context::builder()
            .driver(driver)
            .max_in_flight(QUEUE_DEPTH)
            .build()?;
        let mut reads = buf
            .chunks_mut(CHUNK)
            .enumerate()
            .map(|(i, chunk)| RequestDescriptor::read(src.as_raw_fd(), chunk, (i * CHUNK) as u64))
            .collect::<Result<Vec<_>, _>>()?;
        run_all(&ctx, &mut reads)?;
        info!(stats = ?ctx.stats(), "read source");
    }

    let ctx = Context::builder()
        .driver(driver)
        .max_in_flight(QUEUE_DEPTH)
        .build()?;
    let mut writes = buf
        .chunks(CHUNK)
        .enumerate()
        .map(|(i, chunk)| RequestDescriptor::write(dst.as_raw_fd(), chunk, (i * CHUNK) as u64))
        .collect::<Result<Vec<_>, _>>()?;
    let sync_at = writes.len();
    writes.push(RequestDescriptor::fdatasync(dst.as_raw_fd())?);
    // The data has to be written before it can be synced.
    let (data, sync) = writes.split_at_mut(sync_at);
    run_all(&ctx, data)?;
    run_all(&ctx, sync)?;
    info!(stats = ?ctx.stats(), "wrote destination");

    println!(
        "copied {len} bytes with {driver} in {:?}",
        start.elapsed()
    );
    Ok(())
}
