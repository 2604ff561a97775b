use std::fmt;

/// The operation a [super::RequestDescriptor] asks the driver to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Read,
    Write,
    ReadV,
    WriteV,
    Fsync,
    Fdatasync,
    Poll,
}

impl Kind {
    /// Whether this kind moves bytes between a buffer and the file, and therefore carries a
    /// buffer, a length and an offset.
    pub fn is_transfer(self) -> bool {
        matches!(self, Kind::Read | Kind::Write | Kind::ReadV | Kind::WriteV)
    }

    /// Whether this kind operates on a vector of buffers.
    pub fn is_vectored(self) -> bool {
        matches!(self, Kind::ReadV | Kind::WriteV)
    }

    /// Whether the driver writes into the request buffer.
    pub fn is_read(self) -> bool {
        matches!(self, Kind::Read | Kind::ReadV)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Read => "read",
            Kind::Write => "write",
            Kind::ReadV => "readv",
            Kind::WriteV => "writev",
            Kind::Fsync => "fsync",
            Kind::Fdatasync => "fdatasync",
            Kind::Poll => "poll",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(Kind::Read.is_transfer() && Kind::Read.is_read() && !Kind::Read.is_vectored());
        assert!(Kind::WriteV.is_transfer() && Kind::WriteV.is_vectored() && !Kind::WriteV.is_read());
        for kind in [Kind::Fsync, Kind::Fdatasync, Kind::Poll] {
            assert!(!kind.is_transfer());
            assert!(!kind.is_vectored());
        }
    }
}
