use proactor_core::error::IoResult;
use proactor_core::handle::{BufferSpan, FileDescriptor, OffsetT, SizeT};
use proactor_core::submission::{Opcode, SubmitRecord};

use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// Largest transfer a single read or write may request (`MAX_RW_COUNT`).
pub const MAX_RW_COUNT: u32 = 0x7fff_f000;

#[derive(Debug, Clone, Copy)]
struct Transfer {
    fd: FileDescriptor,
    span: BufferSpan,
    offset: OffsetT,
}

impl Transfer {
    const EMPTY: Self = Self {
        fd: FileDescriptor::INVALID,
        span: BufferSpan::new(0, 0),
        offset: OffsetT::CURRENT,
    };

    fn new((fd, span, offset): (FileDescriptor, BufferSpan, OffsetT)) -> Self {
        Self {
            fd,
            span: BufferSpan::new(span.address, span.length.min(MAX_RW_COUNT)),
            offset,
        }
    }

    fn render(&self, opcode: Opcode, record: &mut SubmitRecord) {
        record.opcode = opcode;
        record.fd = self.fd.descriptor();
        record.addr = self.span.address;
        record.len = self.span.length;
        record.off = self.offset.value();
    }
}

/// Read into a caller-owned buffer. Yields the byte count.
pub struct ReadKind {
    transfer: Transfer,
}

impl ExchangeKind for ReadKind {
    const KIND: OpKind = OpKind::Read;
    type Params = (FileDescriptor, BufferSpan, OffsetT);
    type Output = SizeT;

    fn new() -> Self {
        Self { transfer: Transfer::EMPTY }
    }

    fn prepare(&mut self, params: Self::Params) -> IoResult<()> {
        self.transfer = Transfer::new(params);
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        self.transfer.render(Opcode::Read, record);
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<SizeT> {
        check(result, |n| SizeT(u64::from(n)))
    }

    fn recycle(&mut self) {
        self.transfer = Transfer::EMPTY;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.read
    }
}

/// Write from a caller-owned buffer. Yields the byte count.
pub struct WriteKind {
    transfer: Transfer,
}

impl ExchangeKind for WriteKind {
    const KIND: OpKind = OpKind::Write;
    type Params = (FileDescriptor, BufferSpan, OffsetT);
    type Output = SizeT;

    fn new() -> Self {
        Self { transfer: Transfer::EMPTY }
    }

    fn prepare(&mut self, params: Self::Params) -> IoResult<()> {
        self.transfer = Transfer::new(params);
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        self.transfer.render(Opcode::Write, record);
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<SizeT> {
        check(result, |n| SizeT(u64::from(n)))
    }

    fn recycle(&mut self) {
        self.transfer = Transfer::EMPTY;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.write
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proactor_core::error::Failure;

    #[test]
    fn test_length_clamped() {
        let mut read = ReadKind::new();
        read.prepare((
            FileDescriptor::new(5),
            BufferSpan::new(0x1000, u32::MAX),
            OffsetT::START,
        ))
        .unwrap();
        let mut rec = SubmitRecord::default();
        read.render(&mut rec);
        assert_eq!(rec.opcode, Opcode::Read);
        assert_eq!(rec.fd, 5);
        assert_eq!(rec.len, MAX_RW_COUNT);
        assert_eq!(rec.off, 0);
    }

    #[test]
    fn test_write_current_position() {
        let mut write = WriteKind::new();
        write
            .prepare((FileDescriptor::STDOUT, BufferSpan::new(0x2000, 12), OffsetT::CURRENT))
            .unwrap();
        let mut rec = SubmitRecord::default();
        write.render(&mut rec);
        assert_eq!(rec.opcode, Opcode::Write);
        assert_eq!(rec.off, u64::MAX);
        assert_eq!(rec.len, 12);
    }

    #[test]
    fn test_translate() {
        let mut read = ReadKind::new();
        assert_eq!(read.translate(42, 0), Ok(SizeT(42)));
        assert_eq!(read.translate(0, 0), Ok(SizeT::ZERO));
        assert_eq!(
            read.translate(-libc::EBADF, 0),
            Err(Failure::native(-libc::EBADF))
        );
    }
}
