use std::alloc::{self, Layout};
use std::ptr::NonNull;

use proactor_core::error::{Failure, IoResult, Resource};
use proactor_core::handle::BufferSpan;

/// Page alignment; satisfies `O_DIRECT` on every common filesystem.
pub const PAGE_ALIGN: usize = 4096;

/// A zero-initialised, aligned byte buffer for reads and writes.
///
/// Tracks how many leading bytes are meaningful (`used`), so the same
/// buffer can receive a read and then feed a write of exactly what arrived.
pub struct OffHeapBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
    used: usize,
}

// SAFETY: the buffer exclusively owns its allocation.
unsafe impl Send for OffHeapBuffer {}
unsafe impl Sync for OffHeapBuffer {}

impl OffHeapBuffer {
    /// Allocate `size` bytes aligned to `align` (a power of two).
    pub fn allocate(size: usize, align: usize) -> IoResult<Self> {
        if size == 0 || size > u32::MAX as usize {
            return Err(Failure::InvalidInput("buffer size must be in 1..=u32::MAX"));
        }
        let layout = Layout::from_size_align(size, align)
            .map_err(|_| Failure::InvalidInput("buffer alignment must be a power of two"))?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(Failure::Exhausted(Resource::Memory))?;
        Ok(Self { ptr, layout, used: 0 })
    }

    /// Page-aligned buffer of `size` bytes.
    pub fn fixed_size(size: usize) -> IoResult<Self> {
        Self::allocate(size, PAGE_ALIGN)
    }

    /// Page-aligned buffer holding a copy of `data`, with `used` set to its length.
    pub fn with_data(data: &[u8]) -> IoResult<Self> {
        let mut buffer = Self::fixed_size(data.len().max(1))?;
        buffer.fill(data);
        Ok(buffer)
    }

    #[inline]
    pub fn address(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Record how many bytes are meaningful, typically the result of a read.
    pub fn set_used(&mut self, used: usize) {
        self.used = used.min(self.size());
    }

    /// Copy `data` into the front of the buffer. Returns the bytes copied.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.size());
        self.as_mut_slice()[..n].copy_from_slice(&data[..n]);
        self.used = n;
        n
    }

    /// The meaningful bytes.
    pub fn contents(&self) -> &[u8] {
        &self.as_slice()[..self.used]
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the allocation is `size` initialised bytes owned by self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size()) }
    }

    /// The whole buffer, as the target of a read.
    pub fn span(&self) -> BufferSpan {
        BufferSpan::new(self.address(), self.size() as u32)
    }

    /// The meaningful bytes, as the source of a write.
    pub fn used_span(&self) -> BufferSpan {
        BufferSpan::new(self.address(), self.used as u32)
    }
}

impl Drop for OffHeapBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `allocate` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl std::fmt::Debug for OffHeapBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffHeapBuffer")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("size", &self.size())
            .field("used", &self.used)
            .finish()
    }
}
