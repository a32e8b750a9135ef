use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use proactor_core::error::{Failure, IoResult};

/// A NUL-terminated path for open and stat.
#[derive(Debug)]
pub struct OffHeapCString {
    value: CString,
}

impl OffHeapCString {
    pub fn from_path(path: &Path) -> IoResult<Self> {
        CString::new(path.as_os_str().as_bytes())
            .map(|value| Self { value })
            .map_err(|_| Failure::InvalidInput("path contains an interior NUL byte"))
    }

    #[inline]
    pub fn address(&self) -> u64 {
        self.value.as_ptr() as u64
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nul_terminated() {
        let s = OffHeapCString::from_path(Path::new("/tmp/x")).unwrap();
        assert_eq!(s.as_bytes(), b"/tmp/x");
        // SAFETY: address points at a live CString of 7 bytes including NUL.
        let last = unsafe { *((s.address() + 6) as *const u8) };
        assert_eq!(last, 0);
    }

    #[test]
    fn test_interior_nul_rejected() {
        let err = OffHeapCString::from_path(Path::new("a\0b")).unwrap_err();
        assert!(matches!(err, Failure::InvalidInput(_)));
    }
}
