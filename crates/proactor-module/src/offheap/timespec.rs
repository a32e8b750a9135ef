use io_uring::types::Timespec;

use proactor_core::timeout::Timeout;

/// A `__kernel_timespec` for timeout and linked-timeout submissions.
pub struct OffHeapTimeSpec {
    spec: Box<Timespec>,
}

impl OffHeapTimeSpec {
    pub fn new() -> Self {
        Self { spec: Box::new(Timespec::new()) }
    }

    /// Overwrite the stored interval.
    pub fn set(&mut self, timeout: Timeout) {
        let (secs, nanos) = timeout.seconds_and_nanos();
        *self.spec = Timespec::new().sec(secs).nsec(nanos);
    }

    #[inline]
    pub fn address(&self) -> u64 {
        &*self.spec as *const Timespec as u64
    }
}

impl Default for OffHeapTimeSpec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_survives_move_and_update() {
        let mut ts = OffHeapTimeSpec::new();
        let before = ts.address();
        ts.set(Timeout::from_millis(1500));
        let moved = ts;
        assert_eq!(moved.address(), before);
        assert_ne!(before, 0);
    }
}
