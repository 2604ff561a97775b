use std::sync::{Mutex, MutexGuard};

use crate::{queue::InFlightTable, sys::Driver};

use super::{stats::Counters, Config, PollingMode, Stats};

/// The state shared by the queue and reactor of one context.
///
/// Locking order is always the table first, then anything inside the driver. The table lock is
/// never held while a continuation runs.
pub(crate) struct Shared<'buf> {
    table: Mutex<InFlightTable<'buf>>,
    counters: Counters,
    polling_mode: PollingMode,
    strict: bool,
    // Dropped last, dropping a driver waits until the kernel has released every buffer.
    driver: Box<dyn Driver>,
}

impl<'buf> Shared<'buf> {
    pub(crate) fn new(config: &Config, driver: Box<dyn Driver>) -> Shared<'buf> {
        Shared {
            table: Mutex::new(InFlightTable::new(config.max_in_flight())),
            counters: Counters::default(),
            polling_mode: config.polling_mode(),
            strict: config.strict(),
            driver,
        }
    }

    pub(crate) fn lock_table(&self) -> MutexGuard<'_, InFlightTable<'buf>> {
        self.table
            .lock()
            .expect("failed to lock in-flight table: poisoned")
    }

    pub(crate) fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }

    pub(crate) fn polling_mode(&self) -> PollingMode {
        self.polling_mode
    }

    pub(crate) fn strict(&self) -> bool {
        self.strict
    }

    pub(crate) fn stats(&self) -> Stats {
        let in_flight = self.lock_table().len();
        self.counters.snapshot(in_flight)
    }
}
