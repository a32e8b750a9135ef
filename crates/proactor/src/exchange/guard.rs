use proactor_core::error::{Failure, IoResult};
use proactor_core::submission::{Opcode, SubmitRecord};
use proactor_core::timeout::Timeout;
use proactor_module::offheap::OffHeapTimeSpec;

use super::{ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// How a timeout guard ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// The guard fired and the kernel cancelled the primary operation.
    Fired,
    /// The primary finished first and the guard was cancelled.
    Disarmed,
}

/// A linked timeout (`IORING_OP_LINK_TIMEOUT`) guarding the submission
/// right before it.
pub struct TimeoutGuardKind {
    time_spec: Option<OffHeapTimeSpec>,
}

impl ExchangeKind for TimeoutGuardKind {
    const KIND: OpKind = OpKind::TimeoutGuard;
    type Params = Timeout;
    type Output = Expiry;

    fn new() -> Self {
        Self { time_spec: None }
    }

    fn prepare(&mut self, timeout: Timeout) -> IoResult<()> {
        self.time_spec.get_or_insert_with(OffHeapTimeSpec::new).set(timeout);
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        record.opcode = Opcode::LinkTimeout;
        record.addr = self.time_spec.as_ref().map_or(0, OffHeapTimeSpec::address);
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<Expiry> {
        match -result {
            libc::ETIME => Ok(Expiry::Fired),
            0 | libc::ECANCELED | libc::ENOENT | libc::EALREADY => Ok(Expiry::Disarmed),
            _ => Err(Failure::native(result)),
        }
    }

    fn dispose(&mut self) {
        self.time_spec = None;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate() {
        let mut guard = TimeoutGuardKind::new();
        assert_eq!(guard.translate(-libc::ETIME, 0), Ok(Expiry::Fired));
        assert_eq!(guard.translate(-libc::ECANCELED, 0), Ok(Expiry::Disarmed));
        assert_eq!(guard.translate(-libc::EALREADY, 0), Ok(Expiry::Disarmed));
        assert_eq!(guard.translate(0, 0), Ok(Expiry::Disarmed));
        assert_eq!(
            guard.translate(-libc::EINVAL, 0),
            Err(Failure::native(-libc::EINVAL))
        );
    }

    #[test]
    fn test_render() {
        let mut guard = TimeoutGuardKind::new();
        guard.prepare(Timeout::from_millis(10)).unwrap();
        let mut rec = SubmitRecord::default();
        guard.render(&mut rec);
        assert_eq!(rec.opcode, Opcode::LinkTimeout);
        assert_ne!(rec.addr, 0);
    }
}
