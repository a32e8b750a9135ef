use proactor_core::error::IoResult;
use proactor_core::handle::{FileDescriptor, SizeT, SpliceDescriptor};
use proactor_core::submission::{Opcode, SubmitRecord};

use super::{check, ExchangeKind, OpKind, MAX_RW_COUNT};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// Descriptor-to-descriptor copy through the kernel. Yields the byte count.
pub struct SpliceKind {
    descriptor: Option<SpliceDescriptor>,
}

impl ExchangeKind for SpliceKind {
    const KIND: OpKind = OpKind::Splice;
    type Params = SpliceDescriptor;
    type Output = SizeT;

    fn new() -> Self {
        Self { descriptor: None }
    }

    fn prepare(&mut self, descriptor: SpliceDescriptor) -> IoResult<()> {
        self.descriptor = Some(descriptor);
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        record.opcode = Opcode::Splice;
        let Some(d) = self.descriptor else {
            record.fd = FileDescriptor::INVALID.descriptor();
            return;
        };
        record.aux_fd = d.from.descriptor();
        record.addr2 = d.from_offset.value();
        record.fd = d.to.descriptor();
        record.off = d.to_offset.value();
        record.len = d.bytes.value().min(u64::from(MAX_RW_COUNT)) as u32;
        record.op_flags = d.flags.bits();
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<SizeT> {
        check(result, |n| SizeT(u64::from(n)))
    }

    fn recycle(&mut self) {
        self.descriptor = None;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.splice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proactor_core::flags::SpliceFlags;
    use proactor_core::handle::OffsetT;

    #[test]
    fn test_render_maps_both_sides() {
        let mut splice = SpliceKind::new();
        splice
            .prepare(
                SpliceDescriptor::new(FileDescriptor::new(3), FileDescriptor::new(4), SizeT(1 << 40))
                    .from_offset(OffsetT(10))
                    .flags(SpliceFlags::MOVE),
            )
            .unwrap();
        let mut rec = SubmitRecord::default();
        splice.render(&mut rec);
        assert_eq!(rec.aux_fd, 3);
        assert_eq!(rec.addr2, 10);
        assert_eq!(rec.fd, 4);
        assert_eq!(rec.off, u64::MAX);
        assert_eq!(rec.len, MAX_RW_COUNT);
        assert_eq!(rec.op_flags, libc::SPLICE_F_MOVE);
    }
}
