use proactor_core::handle::IoVectorSpan;

use super::OffHeapBuffer;

/// An `iovec` array over a set of [`OffHeapBuffer`]s.
///
/// The vector only records addresses; the buffers must outlive any
/// operation that uses its span.
pub struct OffHeapIoVector {
    entries: Box<[libc::iovec]>,
}

// SAFETY: the iovec array holds plain addresses and is exclusively owned.
unsafe impl Send for OffHeapIoVector {}
unsafe impl Sync for OffHeapIoVector {}

impl OffHeapIoVector {
    /// Each entry covers a whole buffer, as the targets of a vectored read.
    pub fn readable(buffers: &[OffHeapBuffer]) -> Self {
        Self::build(buffers, OffHeapBuffer::size)
    }

    /// Each entry covers a buffer's meaningful bytes, as the sources of a
    /// vectored write.
    pub fn writable(buffers: &[OffHeapBuffer]) -> Self {
        Self::build(buffers, OffHeapBuffer::used)
    }

    fn build(buffers: &[OffHeapBuffer], length: fn(&OffHeapBuffer) -> usize) -> Self {
        let entries = buffers
            .iter()
            .map(|b| libc::iovec {
                iov_base: b.address() as *mut libc::c_void,
                iov_len: length(b),
            })
            .collect();
        Self { entries }
    }

    /// Total bytes covered by all entries.
    pub fn total_length(&self) -> usize {
        self.entries.iter().map(|e| e.iov_len).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn span(&self) -> IoVectorSpan {
        IoVectorSpan::new(self.entries.as_ptr() as u64, self.entries.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_and_writable_lengths() {
        let mut a = OffHeapBuffer::fixed_size(16).unwrap();
        let b = OffHeapBuffer::fixed_size(32).unwrap();
        a.fill(b"abc");

        let buffers = [a, b];
        let read = OffHeapIoVector::readable(&buffers);
        assert_eq!(read.len(), 2);
        assert_eq!(read.total_length(), 48);

        let write = OffHeapIoVector::writable(&buffers);
        assert_eq!(write.total_length(), 3);
        assert_eq!(write.span().count, 2);
        assert_ne!(write.span().address, read.span().address);
    }
}
