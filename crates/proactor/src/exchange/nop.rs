use proactor_core::error::IoResult;
use proactor_core::submission::{Opcode, SubmitRecord};

use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// Liveness ping: a round trip through the ring with no side effect.
#[derive(Debug, Default)]
pub struct NopKind;

impl ExchangeKind for NopKind {
    const KIND: OpKind = OpKind::Nop;
    type Params = ();
    type Output = ();

    fn new() -> Self {
        NopKind
    }

    fn prepare(&mut self, _params: ()) -> IoResult<()> {
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        record.opcode = Opcode::Nop;
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<()> {
        check(result, |_| ())
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.nop
    }
}
