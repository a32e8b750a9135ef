use proactor_core::error::IoResult;
use proactor_core::handle::{FileDescriptor, IoVectorSpan, OffsetT, SizeT};
use proactor_core::submission::{Opcode, SubmitRecord};

use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

#[derive(Debug, Clone, Copy)]
struct Vectored {
    fd: FileDescriptor,
    span: IoVectorSpan,
    offset: OffsetT,
}

impl Vectored {
    const EMPTY: Self = Self {
        fd: FileDescriptor::INVALID,
        span: IoVectorSpan::new(0, 0),
        offset: OffsetT::CURRENT,
    };

    fn render(&self, opcode: Opcode, record: &mut SubmitRecord) {
        record.opcode = opcode;
        record.fd = self.fd.descriptor();
        record.addr = self.span.address;
        record.len = self.span.count;
        record.off = self.offset.value();
    }
}

/// Scatter read into a caller-owned `iovec` array.
pub struct ReadVectorKind {
    io: Vectored,
}

impl ExchangeKind for ReadVectorKind {
    const KIND: OpKind = OpKind::ReadVector;
    type Params = (FileDescriptor, IoVectorSpan, OffsetT);
    type Output = SizeT;

    fn new() -> Self {
        Self { io: Vectored::EMPTY }
    }

    fn prepare(&mut self, (fd, span, offset): Self::Params) -> IoResult<()> {
        self.io = Vectored { fd, span, offset };
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        self.io.render(Opcode::Readv, record);
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<SizeT> {
        check(result, |n| SizeT(u64::from(n)))
    }

    fn recycle(&mut self) {
        self.io = Vectored::EMPTY;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.read_vector
    }
}

/// Gather write from a caller-owned `iovec` array.
pub struct WriteVectorKind {
    io: Vectored,
}

impl ExchangeKind for WriteVectorKind {
    const KIND: OpKind = OpKind::WriteVector;
    type Params = (FileDescriptor, IoVectorSpan, OffsetT);
    type Output = SizeT;

    fn new() -> Self {
        Self { io: Vectored::EMPTY }
    }

    fn prepare(&mut self, (fd, span, offset): Self::Params) -> IoResult<()> {
        self.io = Vectored { fd, span, offset };
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        self.io.render(Opcode::Writev, record);
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<SizeT> {
        check(result, |n| SizeT(u64::from(n)))
    }

    fn recycle(&mut self) {
        self.io = Vectored::EMPTY;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.write_vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_vectors() {
        let mut readv = ReadVectorKind::new();
        readv
            .prepare((FileDescriptor::new(7), IoVectorSpan::new(0x3000, 4), OffsetT(128)))
            .unwrap();
        let mut rec = SubmitRecord::default();
        readv.render(&mut rec);
        assert_eq!(rec.opcode, Opcode::Readv);
        assert_eq!((rec.fd, rec.addr, rec.len, rec.off), (7, 0x3000, 4, 128));

        let mut writev = WriteVectorKind::new();
        writev
            .prepare((FileDescriptor::new(8), IoVectorSpan::new(0x4000, 2), OffsetT::CURRENT))
            .unwrap();
        writev.render(&mut rec);
        assert_eq!(rec.opcode, Opcode::Writev);
        assert_eq!(rec.len, 2);
    }
}
