//! `UringBackend`: default `RingBackend` implementation.
//!
//! Wraps the `io-uring` crate. The proactor calls:
//! 1. `push()` for each rendered record (queues SQEs, no syscall)
//! 2. `submit()` or `submit_and_wait()` once per cycle (io_uring_enter)
//! 3. `drain()` to reap CQEs
//!
//! No fixed files, no fixed buffers. SQPOLL behind the `sqpoll` feature.

use std::time::Duration;

use io_uring::{opcode, squeue, types, IoUring};
use tracing::debug;

use proactor_core::backend::RingBackend;
use proactor_core::error::{Result, RingError};
use proactor_core::submission::{CompletionRecord, Opcode, SubmitRecord};

/// Configuration for `UringBackend`.
#[derive(Debug, Clone, Copy)]
pub struct UringBackendConfig {
    /// Number of SQ entries. Rounded up to a power of 2 by the kernel.
    pub sq_entries: u32,
    /// Number of CQ entries. Defaults to 2 * sq_entries.
    pub cq_entries: Option<u32>,
}

impl Default for UringBackendConfig {
    fn default() -> Self {
        Self {
            sq_entries: 256,
            cq_entries: None,
        }
    }
}

/// Default io_uring backend.
///
/// NEVER blocks on the push path. Waiting happens only in
/// `submit_and_wait()`, bounded by its timeout.
pub struct UringBackend {
    ring: Option<IoUring>,
    queued: usize,
    batch: Vec<squeue::Entry>,
}

impl UringBackend {
    pub fn new(config: UringBackendConfig) -> Result<Self> {
        let mut builder = IoUring::builder();
        if let Some(cq) = config.cq_entries {
            builder.setup_cqsize(cq);
        }
        #[cfg(feature = "sqpoll")]
        builder.setup_sqpoll(2000);

        let ring = builder
            .build(config.sq_entries)
            .map_err(|e| RingError::Setup(RingError::errno_of(&e)))?;

        debug!(
            sq_entries = ring.params().sq_entries(),
            cq_entries = ring.params().cq_entries(),
            "io_uring ready"
        );

        Ok(Self {
            ring: Some(ring),
            queued: 0,
            batch: Vec::with_capacity(config.sq_entries as usize),
        })
    }

    fn ring(&mut self) -> Result<&mut IoUring> {
        self.ring.as_mut().ok_or(RingError::Closed)
    }

    /// Translate a backend-neutral record into an io_uring SQE.
    ///
    /// Field mapping per opcode is documented on `SubmitRecord`.
    fn build_sqe(rec: &SubmitRecord) -> squeue::Entry {
        let fd = types::Fd(rec.fd);

        let sqe = match rec.opcode {
            Opcode::Nop => opcode::Nop::new().build(),
            Opcode::Timeout => opcode::Timeout::new(rec.addr as *const types::Timespec)
                .count(rec.off as u32)
                .flags(types::TimeoutFlags::from_bits_truncate(rec.op_flags))
                .build(),
            Opcode::LinkTimeout => opcode::LinkTimeout::new(rec.addr as *const types::Timespec)
                .flags(types::TimeoutFlags::from_bits_truncate(rec.op_flags))
                .build(),
            Opcode::Close => opcode::Close::new(fd).build(),
            Opcode::Read => opcode::Read::new(fd, rec.addr as *mut u8, rec.len)
                .offset(rec.off)
                .build(),
            Opcode::Write => opcode::Write::new(fd, rec.addr as *const u8, rec.len)
                .offset(rec.off)
                .build(),
            Opcode::Readv => opcode::Readv::new(fd, rec.addr as *const libc::iovec, rec.len)
                .offset(rec.off)
                .build(),
            Opcode::Writev => opcode::Writev::new(fd, rec.addr as *const libc::iovec, rec.len)
                .offset(rec.off)
                .build(),
            Opcode::Splice => opcode::Splice::new(
                types::Fd(rec.aux_fd),
                rec.addr2 as i64,
                fd,
                rec.off as i64,
                rec.len,
            )
            .flags(rec.op_flags)
            .build(),
            Opcode::OpenAt => opcode::OpenAt::new(fd, rec.addr as *const libc::c_char)
                .flags(rec.op_flags as i32)
                .mode(rec.len)
                .build(),
            Opcode::Statx => opcode::Statx::new(
                fd,
                rec.addr as *const libc::c_char,
                rec.addr2 as *mut types::statx,
            )
            .flags(rec.op_flags as i32)
            .mask(rec.len)
            .build(),
            Opcode::Socket => {
                opcode::Socket::new(rec.fd, rec.off as i32, rec.len as i32).build()
            }
            Opcode::Accept => opcode::Accept::new(
                fd,
                rec.addr as *mut libc::sockaddr,
                rec.addr2 as *mut libc::socklen_t,
            )
            .flags(rec.op_flags as i32)
            .build(),
            Opcode::Connect => opcode::Connect::new(
                fd,
                rec.addr as *const libc::sockaddr,
                rec.off as libc::socklen_t,
            )
            .build(),
            Opcode::PollAdd => opcode::PollAdd::new(fd, rec.op_flags).build(),
        };

        sqe.flags(squeue::Flags::from_bits_truncate(rec.flags.bits()))
            .user_data(rec.user_data)
    }
}

impl RingBackend for UringBackend {
    fn push(&mut self, records: &[SubmitRecord]) -> Result<()> {
        let mut batch = std::mem::take(&mut self.batch);
        batch.clear();
        batch.extend(records.iter().map(Self::build_sqe));

        let pushed = match self.ring() {
            // SAFETY: every address in the batch names memory that the
            // exchange entry (or the caller, for buffers) keeps alive until
            // the matching completion is reaped.
            Ok(ring) => unsafe { ring.submission().push_multiple(&batch) }
                .map_err(|_| RingError::RingFull),
            Err(e) => Err(e),
        };
        self.batch = batch;
        pushed?;
        self.queued += records.len();
        Ok(())
    }

    fn submit(&mut self) -> Result<usize> {
        let submitted = self
            .ring()?
            .submit()
            .map_err(|e| RingError::Submit(RingError::errno_of(&e)))?;
        self.queued = 0;
        Ok(submitted)
    }

    fn submit_and_wait(&mut self, want: usize, timeout: Option<Duration>) -> Result<usize> {
        let ring = self.ring()?;
        let result = match timeout {
            Some(limit) => {
                let ts = types::Timespec::new()
                    .sec(limit.as_secs())
                    .nsec(limit.subsec_nanos());
                let args = types::SubmitArgs::new().timespec(&ts);
                ring.submitter().submit_with_args(want, &args)
            }
            None => ring.submit_and_wait(want),
        };
        self.queued = 0;

        match result {
            Ok(n) => Ok(n),
            Err(e) => match RingError::errno_of(&e) {
                // Wait elapsed, interrupted, or CQ overflow backpressure.
                libc::ETIME | libc::EINTR | libc::EBUSY => Ok(0),
                errno => Err(RingError::Submit(errno)),
            },
        }
    }

    fn drain(&mut self, out: &mut Vec<CompletionRecord>) -> usize {
        let Some(ring) = self.ring.as_mut() else {
            return 0;
        };
        let before = out.len();
        out.extend(ring.completion().map(|cqe| CompletionRecord {
            user_data: cqe.user_data(),
            result: cqe.result(),
            flags: cqe.flags(),
        }));
        out.len() - before
    }

    fn queued(&self) -> usize {
        self.queued
    }

    fn capacity(&self) -> usize {
        self.ring
            .as_ref()
            .map_or(0, |ring| ring.params().sq_entries() as usize)
    }

    fn shutdown(&mut self) {
        // io_uring::IoUring::drop() closes the fd and unmaps the rings;
        // the kernel cancels whatever is still in flight.
        if self.ring.take().is_some() {
            debug!("io_uring released");
        }
        self.queued = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proactor_core::flags::SubmitFlags;

    fn backend() -> Option<UringBackend> {
        UringBackend::new(UringBackendConfig { sq_entries: 8, cq_entries: None }).ok()
    }

    #[test]
    fn test_nop_round_trip() {
        let Some(mut ring) = backend() else {
            eprintln!("io_uring unavailable, skipping");
            return;
        };
        let records = [
            SubmitRecord { opcode: Opcode::Nop, user_data: 7, ..Default::default() },
            SubmitRecord { opcode: Opcode::Nop, user_data: 8, ..Default::default() },
        ];
        ring.push(&records).unwrap();
        assert_eq!(ring.queued(), 2);

        ring.submit_and_wait(2, Some(Duration::from_secs(1))).unwrap();
        let mut out = Vec::new();
        assert_eq!(ring.drain(&mut out), 2);
        let mut tags: Vec<u64> = out.iter().map(|c| c.user_data).collect();
        tags.sort_unstable();
        assert_eq!(tags, vec![7, 8]);
        assert!(out.iter().all(|c| c.result == 0));
    }

    #[test]
    fn test_wait_times_out_without_error() {
        let Some(mut ring) = backend() else { return };
        let n = ring.submit_and_wait(1, Some(Duration::from_millis(10))).unwrap();
        assert_eq!(n, 0);
        let mut out = Vec::new();
        assert_eq!(ring.drain(&mut out), 0);
    }

    #[test]
    fn test_push_all_or_nothing() {
        let Some(mut ring) = backend() else { return };
        let cap = ring.capacity();
        let records = vec![
            SubmitRecord { opcode: Opcode::Nop, flags: SubmitFlags::empty(), ..Default::default() };
            cap + 1
        ];
        assert!(matches!(ring.push(&records), Err(RingError::RingFull)));
        assert_eq!(ring.queued(), 0);
    }

    #[test]
    fn test_shutdown_rejects_further_use() {
        let Some(mut ring) = backend() else { return };
        ring.shutdown();
        assert_eq!(ring.capacity(), 0);
        assert!(matches!(
            ring.push(&[SubmitRecord::default()]),
            Err(RingError::Closed)
        ));
        assert!(matches!(ring.submit(), Err(RingError::Closed)));
    }
}
