use proactor_core::stat::FileStat;

/// A `statx` result block for the stat operation.
pub struct OffHeapStat {
    raw: Box<libc::statx>,
}

impl OffHeapStat {
    pub fn new() -> Self {
        // SAFETY: statx is plain old data; all-zero is valid.
        Self { raw: Box::new(unsafe { std::mem::zeroed() }) }
    }

    #[inline]
    pub fn address(&self) -> u64 {
        &*self.raw as *const libc::statx as u64
    }

    /// Decode what the kernel wrote.
    pub fn extract(&self) -> FileStat {
        FileStat::from_native(&self.raw)
    }

    pub fn reset(&mut self) {
        // SAFETY: as in `new`.
        *self.raw = unsafe { std::mem::zeroed() };
    }
}

impl Default for OffHeapStat {
    fn default() -> Self {
        Self::new()
    }
}
