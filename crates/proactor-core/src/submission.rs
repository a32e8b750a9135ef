//! Submission and completion record types.
//!
//! A [`SubmitRecord`] is the backend-neutral rendering of one kernel
//! submission. Exchange entries write into it; the ring backend translates
//! it into a native submission queue entry. Field meaning follows the
//! kernel SQE layout and depends on the opcode:
//!
//! | opcode         | `fd`       | `addr`       | `len`        | `off`        | `addr2`        | `op_flags`      | `aux_fd`   |
//! |----------------|------------|--------------|--------------|--------------|----------------|-----------------|------------|
//! | READ / WRITE   | fd         | buffer       | length       | offset       |                |                 |            |
//! | READV / WRITEV | fd         | iovec array  | iovec count  | offset       |                |                 |            |
//! | TIMEOUT        |            | timespec     |              | count        |                | timeout flags   |            |
//! | LINK_TIMEOUT   |            | timespec     |              |              |                | timeout flags   |            |
//! | SPLICE         | fd out     |              | length       | offset out   | offset in      | splice flags    | fd in      |
//! | OPENAT         | dirfd      | path         | mode         |              |                | open flags      |            |
//! | STATX          | dirfd      | path         | mask         |              | statx buffer   | statx flags     |            |
//! | SOCKET         | domain     |              | protocol     | type         |                |                 |            |
//! | ACCEPT         | socket     | sockaddr     |              |              | socklen ptr    | accept flags    |            |
//! | CONNECT        | socket     | sockaddr     |              | socklen      |                |                 |            |
//! | POLL_ADD       | fd         |              |              |              |                | poll mask       |            |

use crate::flags::SubmitFlags;

/// `user_data` reserved for the reactor wake-up poll. Never issued as a tag.
pub const WAKE_USER_DATA: u64 = u64::MAX;

/// io_uring opcodes used by the proactor (`IORING_OP_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Opcode {
    #[default]
    Nop = 0,
    Readv = 1,
    Writev = 2,
    PollAdd = 6,
    Timeout = 11,
    Accept = 13,
    LinkTimeout = 15,
    Connect = 16,
    OpenAt = 18,
    Close = 19,
    Statx = 21,
    Read = 22,
    Write = 23,
    Splice = 30,
    Socket = 45,
}

impl Opcode {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Readv => "READV",
            Opcode::Writev => "WRITEV",
            Opcode::PollAdd => "POLL_ADD",
            Opcode::Timeout => "TIMEOUT",
            Opcode::Accept => "ACCEPT",
            Opcode::LinkTimeout => "LINK_TIMEOUT",
            Opcode::Connect => "CONNECT",
            Opcode::OpenAt => "OPENAT",
            Opcode::Close => "CLOSE",
            Opcode::Statx => "STATX",
            Opcode::Read => "READ",
            Opcode::Write => "WRITE",
            Opcode::Splice => "SPLICE",
            Opcode::Socket => "SOCKET",
        }
    }
}

/// One kernel submission, before translation to the native layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmitRecord {
    pub opcode: Opcode,
    pub flags: SubmitFlags,
    pub fd: i32,
    pub addr: u64,
    pub len: u32,
    pub off: u64,
    pub addr2: u64,
    pub op_flags: u32,
    pub aux_fd: i32,
    pub user_data: u64,
}

impl SubmitRecord {
    /// Reset to a blank NOP so a reused record carries nothing over.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One reaped kernel completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionRecord {
    /// Matches the submission's `user_data`.
    pub user_data: u64,
    /// Non-negative result, or negative errno.
    pub result: i32,
    /// `IORING_CQE_F_*` flags.
    pub flags: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values_match_kernel() {
        assert_eq!(Opcode::Nop.code(), 0);
        assert_eq!(Opcode::Timeout.code(), 11);
        assert_eq!(Opcode::LinkTimeout.code(), 15);
        assert_eq!(Opcode::Read.code(), 22);
        assert_eq!(Opcode::Socket.code(), 45);
        assert_eq!(Opcode::Statx.name(), "STATX");
    }

    #[test]
    fn test_clear_resets_record() {
        let mut rec = SubmitRecord {
            opcode: Opcode::Read,
            flags: SubmitFlags::IO_LINK,
            fd: 4,
            addr: 0x1000,
            len: 16,
            user_data: 9,
            ..Default::default()
        };
        rec.clear();
        assert_eq!(rec, SubmitRecord::default());
    }
}
