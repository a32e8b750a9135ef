//! Reactor wake-up abstraction.
//!
//! A `Notifier` wakes the reactor thread when another thread queues work
//! for it while it sleeps in the kernel wait.
//!
//! # Implementors
//!
//! - `EventFdNotifier` (default): writes 1 to an eventfd that the proactor
//!   keeps armed with a poll operation on its own ring.
//! - `NullNotifier`: no descriptor; for single-threaded use and tests.

use std::os::unix::io::RawFd;

use crate::error::Result;

/// Wakes the reactor.
///
/// **Contract:**
/// - `notify()` must NEVER block.
/// - Multiple calls before the reactor wakes are coalesced.
pub trait Notifier: Send + Sync {
    /// Signal that work is waiting.
    fn notify(&self) -> Result<()>;

    /// Descriptor the reactor polls for readability, if any.
    fn poll_descriptor(&self) -> Option<RawFd> {
        None
    }

    /// Consume pending signals after the poll fired.
    fn acknowledge(&self) -> Result<()> {
        Ok(())
    }
}

/// A notifier that never wakes anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self) -> Result<()> {
        Ok(())
    }
}
