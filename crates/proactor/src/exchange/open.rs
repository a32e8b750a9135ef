use std::path::PathBuf;

use proactor_core::error::IoResult;
use proactor_core::flags::{FilePermission, OpenFlags};
use proactor_core::handle::FileDescriptor;
use proactor_core::submission::{Opcode, SubmitRecord};
use proactor_module::offheap::OffHeapCString;

use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// Parameters of an open.
#[derive(Debug, Clone)]
pub struct OpenParams {
    pub path: PathBuf,
    pub flags: OpenFlags,
    pub mode: FilePermission,
}

impl OpenParams {
    /// Open for reading with default permissions.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flags: OpenFlags::empty(),
            mode: FilePermission::DEFAULT_FILE,
        }
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn mode(mut self, mode: FilePermission) -> Self {
        self.mode = mode;
        self
    }
}

/// Open a path relative to the working directory. Yields the new descriptor.
pub struct OpenKind {
    path: Option<OffHeapCString>,
    flags: OpenFlags,
    mode: FilePermission,
}

impl ExchangeKind for OpenKind {
    const KIND: OpKind = OpKind::Open;
    type Params = OpenParams;
    type Output = FileDescriptor;

    fn new() -> Self {
        Self {
            path: None,
            flags: OpenFlags::empty(),
            mode: FilePermission::empty(),
        }
    }

    fn prepare(&mut self, params: OpenParams) -> IoResult<()> {
        self.path = Some(OffHeapCString::from_path(&params.path)?);
        self.flags = params.flags;
        self.mode = params.mode;
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        record.opcode = Opcode::OpenAt;
        record.fd = libc::AT_FDCWD;
        record.addr = self.path.as_ref().map_or(0, OffHeapCString::address);
        record.len = self.mode.bits();
        record.op_flags = self.flags.bits() as u32;
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<FileDescriptor> {
        check(result, |fd| FileDescriptor::new(fd as i32))
    }

    fn recycle(&mut self) {
        self.path = None;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.open
    }
}
