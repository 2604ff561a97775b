#![allow(dead_code)]

use std::time::{Duration, Instant};

use libaio::{Context, DriverKind};

/// Route library logs through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// A non-strict context on the emulated driver.
pub fn emulated<'buf>() -> Context<'buf> {
    init_logging();
    Context::builder()
        .driver(DriverKind::Emulated)
        .strict(false)
        .build()
        .expect("emulated driver never fails to open")
}

/// Drive the reactor until nothing is in flight, panicking if that takes longer than a few
/// seconds.
pub fn drain(ctx: &Context<'_>) -> usize {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut dispatched = 0;
    while ctx.queue().in_flight() > 0 {
        assert!(Instant::now() < deadline, "requests did not complete in time");
        dispatched += ctx
            .reactor()
            .run_once(64, Some(Duration::from_millis(50)))
            .expect("poll failed");
    }
    dispatched
}
