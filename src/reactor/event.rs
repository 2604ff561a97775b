use std::io;

use nix::{libc, poll::PollFlags};

use crate::{queue::CorrelationKey, sys::RawEvent};

/// A single completion reaped from the driver.
///
/// `result` follows the kernel convention: a non-negative byte count (or ready event mask for
/// poll requests) on success, a negated errno on failure. `aux` is the driver's secondary
/// result, `res2` for Linux AIO and the CQE flags for io_uring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionEvent {
    key: CorrelationKey,
    result: i64,
    aux: i64,
}

impl CompletionEvent {
    pub fn new(key: CorrelationKey, result: i64, aux: i64) -> CompletionEvent {
        CompletionEvent { key, result, aux }
    }

    pub fn key(&self) -> CorrelationKey {
        self.key
    }

    pub fn result(&self) -> i64 {
        self.result
    }

    pub fn aux(&self) -> i64 {
        self.aux
    }

    /// Decode the primary result into bytes transferred or the OS error. A negative result that
    /// does not fit an errno is reported as an [io::ErrorKind::Other] error.
    pub fn outcome(&self) -> io::Result<usize> {
        if self.result >= 0 {
            return usize::try_from(self.result).map_err(io::Error::other);
        }
        match self
            .result
            .checked_neg()
            .and_then(|errno| i32::try_from(errno).ok())
        {
            Some(errno) => Err(io::Error::from_raw_os_error(errno)),
            None => Err(io::Error::other(format!(
                "completion result {} is not an errno",
                self.result
            ))),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.result == -(libc::ECANCELED as i64)
    }

    /// The ready events of a successful poll request. Meaningless for other kinds.
    pub fn poll_events(&self) -> Option<PollFlags> {
        if self.result < 0 {
            return None;
        }
        Some(PollFlags::from_bits_truncate(self.result as libc::c_short))
    }
}

impl From<RawEvent> for CompletionEvent {
    fn from(raw: RawEvent) -> Self {
        CompletionEvent {
            key: CorrelationKey::from_token(raw.token),
            result: raw.res,
            aux: raw.res2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_decoding() {
        let key = CorrelationKey::new(3, 1);

        let event = CompletionEvent::new(key, 4096, 0);
        assert_eq!(event.outcome().unwrap(), 4096);
        assert!(!event.is_cancelled());

        let event = CompletionEvent::new(key, -(libc::EBADF as i64), 0);
        assert_eq!(event.outcome().unwrap_err().raw_os_error(), Some(libc::EBADF));

        let event = CompletionEvent::new(key, -(libc::ECANCELED as i64), 0);
        assert!(event.is_cancelled());
        assert_eq!(event.poll_events(), None);
    }

    #[test]
    fn test_out_of_range_errors() {
        let key = CorrelationKey::new(0, 0);

        let err = CompletionEvent::new(key, i64::MIN, 0).outcome().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(err.raw_os_error(), None);

        let err = CompletionEvent::new(key, -(i64::from(i32::MAX) + 1), 0)
            .outcome()
            .unwrap_err();
        assert_eq!(err.raw_os_error(), None);
    }

    #[test]
    fn test_poll_events_decoding() {
        let event = CompletionEvent::new(CorrelationKey::new(0, 0), libc::POLLIN as i64, 0);
        assert_eq!(event.poll_events(), Some(PollFlags::POLLIN));
    }

    #[test]
    fn test_from_raw_event() {
        let key = CorrelationKey::new(9, 4);
        let event = CompletionEvent::from(RawEvent {
            token: key.to_token(),
            res: 12,
            res2: 1,
        });
        assert_eq!(event.key(), key);
        assert_eq!(event.result(), 12);
        assert_eq!(event.aux(), 1);
    }
}
