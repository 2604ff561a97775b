use std::fmt;

/// The [SendConst] construct is used to tell the compiler that a raw buffer pointer can be handed
/// to another thread. The drivers in [crate::sys] copy these pointers into kernel control blocks
/// (or into the emulation queue), and the completion may be reaped on a different thread than
/// the one that submitted it.
#[repr(transparent)]
pub struct SendConst<T>(*const T);

impl<T> SendConst<T> {
    /// Create a new [SendConst] structure around a `*const T`.
    ///
    /// SAFETY:
    /// - The pointee must remain valid and unmodified until the request that carries this
    /// pointer has completed. Within this crate that is guaranteed by the `'buf` borrow held by
    /// the [crate::Context] that the request was submitted to.
    pub unsafe fn new(val: *const T) -> SendConst<T> {
        SendConst(val)
    }

    /// Return the inner pointer for use.
    pub fn to_ptr(&self) -> *const T {
        self.0
    }
}

impl<T> Clone for SendConst<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendConst<T> {}

impl<T> fmt::Debug for SendConst<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SendConst({:p})", self.0)
    }
}

// SAFETY: We only ever wrap pointers into buffers that are borrowed for the lifetime of the
// owning context, so moving the address between threads can not outlive the memory.
unsafe impl<T> Send for SendConst<T> {}

/// The [SendMut] construct is the mutable counterpart of [SendConst], used for the destination
/// buffers of read requests which the kernel (or the emulation layer) writes into.
#[repr(transparent)]
pub struct SendMut<T>(*mut T);

impl<T> SendMut<T> {
    /// Create a new [SendMut] structure around a `*mut T`.
    ///
    /// SAFETY:
    /// - The pointee must be exclusively borrowed for as long as the request carrying this
    /// pointer is in flight, nothing else may read or write it until the completion is reaped.
    pub unsafe fn new(val: *mut T) -> SendMut<T> {
        SendMut(val)
    }

    /// Return the inner pointer for use.
    pub fn to_ptr(&self) -> *mut T {
        self.0
    }
}

impl<T> Clone for SendMut<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendMut<T> {}

impl<T> fmt::Debug for SendMut<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SendMut({:p})", self.0)
    }
}

// SAFETY: See SendConst, the exclusive borrow backing this pointer is held by the context.
unsafe impl<T> Send for SendMut<T> {}

impl<T> From<SendMut<T>> for SendConst<T> {
    fn from(value: SendMut<T>) -> Self {
        SendConst(value.0 as *const T)
    }
}
