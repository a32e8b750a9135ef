use std::path::PathBuf;

use proactor_core::error::{Failure, IoResult};
use proactor_core::flags::{StatFlags, StatMask};
use proactor_core::handle::FileDescriptor;
use proactor_core::stat::FileStat;
use proactor_core::submission::{Opcode, SubmitRecord};
use proactor_module::offheap::{OffHeapCString, OffHeapStat};

use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// What to stat.
#[derive(Debug, Clone)]
pub enum StatTarget {
    /// A path relative to the working directory.
    Path(PathBuf),
    /// An open descriptor (`AT_EMPTY_PATH`).
    Descriptor(FileDescriptor),
}

#[derive(Debug, Clone)]
pub struct StatParams {
    pub target: StatTarget,
    pub flags: StatFlags,
    pub mask: StatMask,
}

impl StatParams {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            target: StatTarget::Path(path.into()),
            flags: StatFlags::empty(),
            mask: StatMask::BASIC_STATS,
        }
    }

    pub fn descriptor(fd: FileDescriptor) -> Self {
        Self {
            target: StatTarget::Descriptor(fd),
            flags: StatFlags::EMPTY_PATH,
            mask: StatMask::BASIC_STATS,
        }
    }

    pub fn flags(mut self, flags: StatFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn mask(mut self, mask: StatMask) -> Self {
        self.mask = mask;
        self
    }
}

/// `statx` on a path or descriptor. Yields the decoded [`FileStat`].
pub struct StatKind {
    dir: FileDescriptor,
    path: Option<OffHeapCString>,
    flags: StatFlags,
    mask: StatMask,
    buffer: Option<OffHeapStat>,
}

impl ExchangeKind for StatKind {
    const KIND: OpKind = OpKind::Stat;
    type Params = StatParams;
    type Output = FileStat;

    fn new() -> Self {
        Self {
            dir: FileDescriptor::INVALID,
            path: None,
            flags: StatFlags::empty(),
            mask: StatMask::empty(),
            buffer: None,
        }
    }

    fn prepare(&mut self, params: StatParams) -> IoResult<()> {
        let (dir, path) = match &params.target {
            StatTarget::Path(path) => (FileDescriptor::new(libc::AT_FDCWD), path.as_path()),
            StatTarget::Descriptor(fd) => (*fd, std::path::Path::new("")),
        };
        self.path = Some(OffHeapCString::from_path(path)?);
        self.dir = dir;
        self.flags = params.flags;
        self.mask = params.mask;
        self.buffer.get_or_insert_with(OffHeapStat::new).reset();
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        record.opcode = Opcode::Statx;
        record.fd = self.dir.descriptor();
        record.addr = self.path.as_ref().map_or(0, OffHeapCString::address);
        record.addr2 = self.buffer.as_ref().map_or(0, OffHeapStat::address);
        record.len = self.mask.bits();
        record.op_flags = self.flags.bits() as u32;
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<FileStat> {
        check(result, |_| ())?;
        self.buffer
            .as_ref()
            .map(OffHeapStat::extract)
            .ok_or(Failure::InvalidInput("stat completed without a result buffer"))
    }

    fn recycle(&mut self) {
        self.path = None;
        self.dir = FileDescriptor::INVALID;
    }

    fn dispose(&mut self) {
        self.recycle();
        self.buffer = None;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.stat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_path() {
        let mut stat = StatKind::new();
        stat.prepare(StatParams::path("/etc/hostname")).unwrap();
        let mut rec = SubmitRecord::default();
        stat.render(&mut rec);
        assert_eq!(rec.opcode, Opcode::Statx);
        assert_eq!(rec.fd, libc::AT_FDCWD);
        assert_ne!(rec.addr, 0);
        assert_ne!(rec.addr2, 0);
        assert_eq!(rec.len, libc::STATX_BASIC_STATS);
        assert_eq!(rec.op_flags, 0);
    }

    #[test]
    fn test_render_descriptor() {
        let mut stat = StatKind::new();
        stat.prepare(StatParams::descriptor(FileDescriptor::new(9))).unwrap();
        let mut rec = SubmitRecord::default();
        stat.render(&mut rec);
        assert_eq!(rec.fd, 9);
        assert_eq!(rec.op_flags as i32, libc::AT_EMPTY_PATH);
    }

    #[test]
    fn test_failure_passes_through() {
        let mut stat = StatKind::new();
        stat.prepare(StatParams::path("/nonexistent")).unwrap();
        let err = stat.translate(-libc::ENOENT, 0).unwrap_err();
        assert_eq!(err.errno(), Some(libc::ENOENT));
    }
}
