//! Failure taxonomy.
//!
//! Two families live here:
//!
//! - [`Failure`]: the cause carried by a failed completion. Native kernel
//!   errors, requests against a closed proactor, and exhausted resources
//!   all arrive through the caller's continuation as `Err(Failure)`.
//! - [`RingError`]: setup and submission errors of the ring backend itself,
//!   returned from constructors and from the reactor loop.

use std::fmt;

use nix::errno::Errno;

/// Outcome of a completed operation.
pub type IoResult<T> = std::result::Result<T, Failure>;

/// A kernel error number from a negative completion result.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeError {
    code: i32,
}

impl NativeError {
    pub const fn new(code: i32) -> Self {
        Self { code: code.abs() }
    }

    /// The errno value (always positive).
    #[inline]
    pub const fn code(self) -> i32 {
        self.code
    }

    /// Symbolic name, e.g. `EBADF`.
    pub fn name(self) -> String {
        format!("{:?}", Errno::from_raw(self.code))
    }

    /// Human-readable category, e.g. `Bad file number`.
    pub fn category(self) -> &'static str {
        Errno::from_raw(self.code).desc()
    }
}

impl fmt::Debug for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeError({} = {})", self.name(), self.code)
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.category())
    }
}

/// A resource that ran out while accepting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// The per-kind exchange pool reached its growth ceiling.
    ExchangePool(&'static str),
    /// The kernel submission queue stayed full after a flush.
    SubmissionQueue,
    /// The cross-thread request queue is full.
    RequestQueue,
    /// Native memory allocation failed.
    Memory,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::ExchangePool(kind) => write!(f, "{} exchange pool", kind),
            Resource::SubmissionQueue => write!(f, "submission queue"),
            Resource::RequestQueue => write!(f, "request queue"),
            Resource::Memory => write!(f, "native memory"),
        }
    }
}

/// Why an operation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// The kernel completed the operation with a negative result code.
    #[error("{0}")]
    Native(NativeError),
    /// The proactor was shut down before (or while) the request was handled.
    #[error("proactor is closed")]
    Closed,
    /// A bounded resource was exhausted; the request never reached the kernel.
    #[error("{0} exhausted")]
    Exhausted(Resource),
    /// Parameters the kernel could never accept (e.g. a path with a NUL byte).
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl Failure {
    /// Build a failure from a raw (negative) kernel result code.
    #[inline]
    pub const fn native(result: i32) -> Self {
        Failure::Native(NativeError::new(result))
    }

    /// The errno, when this is a native failure.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Failure::Native(e) => Some(e.code()),
            _ => None,
        }
    }

    /// `ECANCELED`: the kernel cancelled the operation, typically because
    /// a linked timeout guard fired first.
    pub fn is_cancelled(&self) -> bool {
        self.errno() == Some(libc::ECANCELED)
    }

    /// `ETIME` or `ETIMEDOUT`.
    pub fn is_timed_out(&self) -> bool {
        matches!(self.errno(), Some(libc::ETIME) | Some(libc::ETIMEDOUT))
    }
}

impl From<Errno> for Failure {
    fn from(errno: Errno) -> Self {
        Failure::Native(NativeError::new(errno as i32))
    }
}

/// Errors from the ring backend itself.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    /// Ring is full, cannot push more submissions.
    #[error("ring full")]
    RingFull,
    /// io_uring setup failed.
    #[error("io_uring setup: errno {0}")]
    Setup(i32),
    /// io_uring_enter failed.
    #[error("io_uring submit: errno {0}")]
    Submit(i32),
    /// The backend has already released its ring.
    #[error("ring released")]
    Closed,
    /// OS error with errno.
    #[error("OS error: errno {0}")]
    Os(i32),
}

impl RingError {
    /// errno of an `io::Error`, `-1` when it carries none.
    pub fn errno_of(error: &std::io::Error) -> i32 {
        error.raw_os_error().unwrap_or(-1)
    }
}

pub type Result<T> = std::result::Result<T, RingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_from_negative_code() {
        let f = Failure::native(-libc::EBADF);
        assert_eq!(f.errno(), Some(libc::EBADF));
        assert!(!f.is_cancelled());

        match f {
            Failure::Native(e) => assert_eq!(e.name(), "EBADF"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classification() {
        assert!(Failure::native(-libc::ECANCELED).is_cancelled());
        assert!(Failure::native(-libc::ETIME).is_timed_out());
        assert!(Failure::native(-libc::ETIMEDOUT).is_timed_out());
        assert_eq!(Failure::Closed.errno(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Failure::Closed.to_string(), "proactor is closed");
        assert_eq!(
            Failure::Exhausted(Resource::ExchangePool("read")).to_string(),
            "read exchange pool exhausted"
        );
        let native = Failure::native(-libc::ENOENT).to_string();
        assert!(native.starts_with("ENOENT: "), "{}", native);
        assert_eq!(
            format!("{}", RingError::Setup(12)),
            "io_uring setup: errno 12"
        );
    }

    #[test]
    fn test_result_combinators_skip_failure() {
        let failed: IoResult<u32> = Err(Failure::Closed);
        let mapped = failed.map(|_| -> u32 { panic!("mapper invoked on failure") });
        assert_eq!(mapped, Err(Failure::Closed));

        let ok: IoResult<u32> = Ok(2);
        let chained = ok.and_then(|v| if v > 1 { Ok(v * 10) } else { Err(Failure::Closed) });
        assert_eq!(chained.map_or_else(|_| 0, |v| v), 20);
    }

    #[test]
    fn test_from_errno() {
        let f: Failure = Errno::EAGAIN.into();
        assert_eq!(f.errno(), Some(libc::EAGAIN));
    }
}
