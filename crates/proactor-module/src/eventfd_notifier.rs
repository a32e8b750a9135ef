//! `EventFdNotifier`: default `Notifier` implementation.
//!
//! Writes to an eventfd to wake the reactor. The proactor keeps a poll
//! armed on the descriptor, so a write completes that poll and breaks the
//! reactor out of its kernel wait.
//! Coalescing: multiple calls to `notify()` before the reactor reads the
//! eventfd result in a single wakeup (eventfd counter semantics).

use proactor_core::error::{RingError, Result};
use proactor_core::notifier::Notifier;

use std::os::unix::io::RawFd;

pub struct EventFdNotifier {
    fd: RawFd,
    owned: bool, // true if we created the fd (must close on drop)
}

impl EventFdNotifier {
    /// Wrap an existing eventfd created with `EFD_NONBLOCK | EFD_CLOEXEC`.
    ///
    /// Ownership stays with the caller; the notifier does NOT close it.
    pub fn new(eventfd: RawFd) -> Self {
        Self { fd: eventfd, owned: false }
    }

    /// Create a new eventfd and wrap it. The notifier closes it on drop.
    pub fn create() -> Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(RingError::Os(nix::errno::Errno::last_raw()));
        }
        Ok(Self { fd, owned: true })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl Notifier for EventFdNotifier {
    fn notify(&self) -> Result<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = nix::errno::Errno::last_raw();
            // EAGAIN: the counter is saturated, so a wakeup is already pending.
            if errno == libc::EAGAIN {
                return Ok(());
            }
            return Err(RingError::Os(errno));
        }
        Ok(())
    }

    fn poll_descriptor(&self) -> Option<RawFd> {
        Some(self.fd)
    }

    fn acknowledge(&self) -> Result<()> {
        let mut val: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd,
                &mut val as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = nix::errno::Errno::last_raw();
            if errno == libc::EAGAIN {
                return Ok(());
            }
            return Err(RingError::Os(errno));
        }
        Ok(())
    }
}

impl Drop for EventFdNotifier {
    fn drop(&mut self) {
        if self.owned && self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_then_acknowledge() {
        let n = EventFdNotifier::create().unwrap();
        assert_eq!(n.poll_descriptor(), Some(n.fd()));

        n.notify().unwrap();
        n.notify().unwrap();
        n.acknowledge().unwrap();
        // Nothing pending: the nonblocking read reports EAGAIN, which is fine.
        n.acknowledge().unwrap();
    }

    #[test]
    fn test_borrowed_fd_is_not_closed() {
        let owner = EventFdNotifier::create().unwrap();
        {
            let borrowed = EventFdNotifier::new(owner.fd());
            borrowed.notify().unwrap();
        }
        owner.acknowledge().unwrap();
        owner.notify().unwrap();
    }
}
