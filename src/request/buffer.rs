use std::io::{IoSlice, IoSliceMut};

use nix::libc;

use crate::ptr::{SendConst, SendMut};

/// A caller owned memory region borrowed by a [super::RequestDescriptor]. The descriptor never
/// takes ownership of the bytes, it only holds the borrow for as long as the request may be in
/// flight.
///
/// Read kinds need one of the mutable variants, write kinds accept either.
#[derive(Debug)]
pub enum Buffer<'buf> {
    Slice(&'buf [u8]),
    SliceMut(&'buf mut [u8]),
    Vectored(&'buf [IoSlice<'buf>]),
    VectoredMut(&'buf mut [IoSliceMut<'buf>]),
}

/// The raw form of a [Buffer] as handed to the drivers.
pub(crate) enum RawBuffer {
    Mut(SendMut<u8>),
    Const(SendConst<u8>),
    Vectored(SendConst<libc::iovec>, usize),
}

impl<'buf> Buffer<'buf> {
    /// Total number of bytes covered by this buffer.
    pub fn len(&self) -> usize {
        match self {
            Buffer::Slice(buf) => buf.len(),
            Buffer::SliceMut(buf) => buf.len(),
            Buffer::Vectored(bufs) => bufs.iter().map(|b| b.len()).sum(),
            Buffer::VectoredMut(bufs) => bufs.iter().map(|b| b.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_vectored(&self) -> bool {
        matches!(self, Buffer::Vectored(_) | Buffer::VectoredMut(_))
    }

    /// Whether the borrow is exclusive, which is required for the driver to write into it.
    pub fn is_mutable(&self) -> bool {
        matches!(self, Buffer::SliceMut(_) | Buffer::VectoredMut(_))
    }

    /// The bytes of a contiguous buffer, `None` for vectored buffers.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            Buffer::Slice(buf) => Some(*buf),
            Buffer::SliceMut(buf) => Some(&**buf),
            _ => None,
        }
    }

    /// Iterate over every segment of the buffer, contiguous buffers yield a single segment.
    pub fn segments(&self) -> Box<dyn Iterator<Item = &[u8]> + '_> {
        match self {
            Buffer::Slice(buf) => Box::new(std::iter::once(&buf[..])),
            Buffer::SliceMut(buf) => Box::new(std::iter::once(&buf[..])),
            Buffer::Vectored(bufs) => Box::new(bufs.iter().map(|b| &**b)),
            Buffer::VectoredMut(bufs) => Box::new(bufs.iter().map(|b| &**b)),
        }
    }

    /// Produce the raw pointer form of this buffer for submission.
    pub(crate) fn as_raw(&mut self) -> RawBuffer {
        // SAFETY: The 'buf borrow outlives the owning context, which drains every in-flight
        // request before it releases the borrow.
        unsafe {
            match self {
                Buffer::Slice(buf) => RawBuffer::Const(SendConst::new(buf.as_ptr())),
                Buffer::SliceMut(buf) => RawBuffer::Mut(SendMut::new(buf.as_mut_ptr())),
                // IoSlice and IoSliceMut are guaranteed to be ABI compatible with iovec on unix.
                Buffer::Vectored(bufs) => RawBuffer::Vectored(
                    SendConst::new(bufs.as_ptr() as *const libc::iovec),
                    bufs.len(),
                ),
                Buffer::VectoredMut(bufs) => RawBuffer::Vectored(
                    SendConst::new(bufs.as_ptr() as *const libc::iovec),
                    bufs.len(),
                ),
            }
        }
    }
}

impl<'buf> From<&'buf [u8]> for Buffer<'buf> {
    fn from(value: &'buf [u8]) -> Self {
        Buffer::Slice(value)
    }
}

impl<'buf> From<&'buf mut [u8]> for Buffer<'buf> {
    fn from(value: &'buf mut [u8]) -> Self {
        Buffer::SliceMut(value)
    }
}

impl<'buf> From<&'buf [IoSlice<'buf>]> for Buffer<'buf> {
    fn from(value: &'buf [IoSlice<'buf>]) -> Self {
        Buffer::Vectored(value)
    }
}

impl<'buf> From<&'buf mut [IoSliceMut<'buf>]> for Buffer<'buf> {
    fn from(value: &'buf mut [IoSliceMut<'buf>]) -> Self {
        Buffer::VectoredMut(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectored_len_sums_segments() {
        let a = [1u8; 3];
        let b = [2u8; 5];
        let slices = [IoSlice::new(&a), IoSlice::new(&b)];
        let buf = Buffer::from(&slices[..]);

        assert!(buf.is_vectored());
        assert!(!buf.is_mutable());
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.as_slice(), None);
        assert_eq!(buf.segments().collect::<Vec<_>>(), vec![&a[..], &b[..]]);
    }

    #[test]
    fn test_contiguous_views() {
        let mut data = vec![7u8; 16];
        let buf = Buffer::from(data.as_mut_slice());

        assert!(buf.is_mutable());
        assert_eq!(buf.as_slice(), Some(&[7u8; 16][..]));
        assert_eq!(buf.segments().count(), 1);
    }
}
