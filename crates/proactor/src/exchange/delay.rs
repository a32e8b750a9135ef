use std::time::{Duration, Instant};

use proactor_core::error::{Failure, IoResult};
use proactor_core::submission::{Opcode, SubmitRecord};
use proactor_core::timeout::Timeout;
use proactor_module::offheap::OffHeapTimeSpec;

use super::{ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// Sleep for a duration. Expiry is the expected outcome, so `ETIME`
/// resolves as success carrying the measured elapsed time.
pub struct DelayKind {
    time_spec: Option<OffHeapTimeSpec>,
    started: Option<Instant>,
}

impl ExchangeKind for DelayKind {
    const KIND: OpKind = OpKind::Delay;
    type Params = Timeout;
    type Output = Duration;

    fn new() -> Self {
        Self { time_spec: None, started: None }
    }

    fn prepare(&mut self, timeout: Timeout) -> IoResult<()> {
        self.time_spec.get_or_insert_with(OffHeapTimeSpec::new).set(timeout);
        self.started = Some(Instant::now());
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        record.opcode = Opcode::Timeout;
        record.addr = self.time_spec.as_ref().map_or(0, OffHeapTimeSpec::address);
        // Pure timer: no completion count.
        record.off = 0;
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<Duration> {
        let elapsed = self.started.map_or(Duration::ZERO, |t| t.elapsed());
        if result >= 0 || result == -libc::ETIME {
            Ok(elapsed)
        } else {
            Err(Failure::native(result))
        }
    }

    fn recycle(&mut self) {
        self.started = None;
    }

    fn dispose(&mut self) {
        self.started = None;
        self.time_spec = None;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_success() {
        let mut kind = DelayKind::new();
        kind.prepare(Timeout::from_millis(1)).unwrap();
        assert!(kind.translate(-libc::ETIME, 0).is_ok());
        assert!(kind.translate(0, 0).is_ok());
        assert_eq!(
            kind.translate(-libc::ECANCELED, 0),
            Err(Failure::native(-libc::ECANCELED))
        );
    }

    #[test]
    fn test_timespec_kept_across_recycle() {
        let mut kind = DelayKind::new();
        assert!(kind.time_spec.is_none());
        kind.prepare(Timeout::from_secs(1)).unwrap();
        let mut rec = SubmitRecord::default();
        kind.render(&mut rec);
        let first = rec.addr;
        assert_ne!(first, 0);

        kind.recycle();
        kind.prepare(Timeout::from_secs(2)).unwrap();
        kind.render(&mut rec);
        assert_eq!(rec.addr, first);

        kind.dispose();
        assert!(kind.time_spec.is_none());
    }
}
