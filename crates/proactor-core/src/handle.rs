//! Native handle types.
//!
//! Thin value types over native integers and structs. No logic beyond
//! conversion; everything here is `Copy` and safe to move across threads.

use std::fmt;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

use crate::flags::SpliceFlags;

/// A file or socket descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FileDescriptor(RawFd);

impl FileDescriptor {
    pub const STDIN: Self = Self(0);
    pub const STDOUT: Self = Self(1);
    pub const STDERR: Self = Self(2);
    /// Never a valid descriptor. Handy for provoking `EBADF`.
    pub const INVALID: Self = Self(-1);

    #[inline]
    pub const fn new(fd: RawFd) -> Self {
        Self(fd)
    }

    #[inline]
    pub const fn descriptor(self) -> RawFd {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl AsRawFd for FileDescriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl From<RawFd> for FileDescriptor {
    fn from(fd: RawFd) -> Self {
        Self(fd)
    }
}

impl fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd({})", self.0)
    }
}

/// Byte offset into a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct OffsetT(pub u64);

impl OffsetT {
    /// Use (and advance) the current file position, as `read(2)` does.
    pub const CURRENT: Self = Self(u64::MAX);
    pub const START: Self = Self(0);

    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct SizeT(pub u64);

impl SizeT {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SizeT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address family for socket creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Inet,
    Inet6,
}

impl AddressFamily {
    pub const fn native(self) -> i32 {
        match self {
            AddressFamily::Inet => libc::AF_INET,
            AddressFamily::Inet6 => libc::AF_INET6,
        }
    }

    pub const fn of(address: &SocketAddr) -> Self {
        match address {
            SocketAddr::V4(_) => AddressFamily::Inet,
            SocketAddr::V6(_) => AddressFamily::Inet6,
        }
    }
}

/// Socket type for socket creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    Stream,
    Datagram,
    SeqPacket,
    Raw,
}

impl SocketType {
    pub const fn native(self) -> i32 {
        match self {
            SocketType::Stream => libc::SOCK_STREAM,
            SocketType::Datagram => libc::SOCK_DGRAM,
            SocketType::SeqPacket => libc::SOCK_SEQPACKET,
            SocketType::Raw => libc::SOCK_RAW,
        }
    }
}

/// Caller-owned native memory handed to a read or write.
///
/// The span only names the memory. Whoever built it must keep the memory
/// alive and untouched until the operation using it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSpan {
    pub address: u64,
    pub length: u32,
}

impl BufferSpan {
    pub const fn new(address: u64, length: u32) -> Self {
        Self { address, length }
    }
}

/// Caller-owned `iovec` array handed to a vectored read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoVectorSpan {
    pub address: u64,
    pub count: u32,
}

impl IoVectorSpan {
    pub const fn new(address: u64, count: u32) -> Self {
        Self { address, count }
    }
}

/// Parameters of a descriptor-to-descriptor copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceDescriptor {
    pub from: FileDescriptor,
    pub from_offset: OffsetT,
    pub to: FileDescriptor,
    pub to_offset: OffsetT,
    pub bytes: SizeT,
    pub flags: SpliceFlags,
}

impl SpliceDescriptor {
    /// Copy `bytes` between two descriptors at their current positions.
    ///
    /// One side must be a pipe for the kernel to accept the request.
    pub fn new(from: FileDescriptor, to: FileDescriptor, bytes: SizeT) -> Self {
        Self {
            from,
            from_offset: OffsetT::CURRENT,
            to,
            to_offset: OffsetT::CURRENT,
            bytes,
            flags: SpliceFlags::empty(),
        }
    }

    pub fn from_offset(mut self, offset: OffsetT) -> Self {
        self.from_offset = offset;
        self
    }

    pub fn to_offset(mut self, offset: OffsetT) -> Self {
        self.to_offset = offset;
        self
    }

    pub fn flags(mut self, flags: SpliceFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// A listening socket produced by the listen operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenContext {
    pub socket: FileDescriptor,
    /// The address actually bound (port 0 resolves to the assigned port).
    pub address: SocketAddr,
    pub queue_depth: SizeT,
}

/// An accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionContext {
    pub socket: FileDescriptor,
    /// `None` when the kernel reported an address family we do not decode.
    pub peer: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_validity() {
        assert!(FileDescriptor::STDIN.is_valid());
        assert!(!FileDescriptor::INVALID.is_valid());
        assert_eq!(FileDescriptor::new(7).as_raw_fd(), 7);
        assert_eq!(format!("{}", FileDescriptor::new(3)), "fd(3)");
    }

    #[test]
    fn test_address_family_of() {
        let v4: SocketAddr = "127.0.0.1:80".parse().unwrap();
        let v6: SocketAddr = "[::1]:80".parse().unwrap();
        assert_eq!(AddressFamily::of(&v4), AddressFamily::Inet);
        assert_eq!(AddressFamily::of(&v6).native(), libc::AF_INET6);
    }

    #[test]
    fn test_splice_builder() {
        let d = SpliceDescriptor::new(FileDescriptor::new(3), FileDescriptor::new(4), SizeT(10))
            .from_offset(OffsetT(5))
            .flags(SpliceFlags::MOVE);
        assert_eq!(d.from_offset, OffsetT(5));
        assert_eq!(d.to_offset, OffsetT::CURRENT);
        assert!(d.flags.contains(SpliceFlags::MOVE));
    }
}
