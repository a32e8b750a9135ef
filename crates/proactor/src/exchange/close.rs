use proactor_core::error::IoResult;
use proactor_core::handle::FileDescriptor;
use proactor_core::submission::{Opcode, SubmitRecord};

use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// Close a descriptor.
#[derive(Debug)]
pub struct CloseKind {
    fd: FileDescriptor,
}

impl ExchangeKind for CloseKind {
    const KIND: OpKind = OpKind::Close;
    type Params = FileDescriptor;
    type Output = ();

    fn new() -> Self {
        Self { fd: FileDescriptor::INVALID }
    }

    fn prepare(&mut self, fd: FileDescriptor) -> IoResult<()> {
        self.fd = fd;
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        record.opcode = Opcode::Close;
        record.fd = self.fd.descriptor();
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<()> {
        check(result, |_| ())
    }

    fn recycle(&mut self) {
        self.fd = FileDescriptor::INVALID;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.close
    }
}
