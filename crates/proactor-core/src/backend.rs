//! Ring backend abstraction.
//!
//! A `RingBackend` owns the kernel submission and completion queues.
//! The proactor pushes rendered [`SubmitRecord`]s, kicks the kernel once
//! per cycle, and drains [`CompletionRecord`]s.
//!
//! # Implementors
//!
//! - `UringBackend` (proactor-module): io_uring through the `io-uring` crate.
//! - Test backends that script completions without a kernel.

use std::time::Duration;

use crate::error::Result;
use crate::submission::{CompletionRecord, SubmitRecord};

/// Kernel submission/completion rings.
///
/// **Contract:**
/// - `push()` never blocks and never enters the kernel; queued records are
///   handed over by the next `submit()` or `submit_and_wait()`.
/// - `push()` is all-or-nothing so linked records are never split.
/// - `drain()` never blocks.
/// - Completions are reported in kernel order, which need not match
///   submission order.
pub trait RingBackend: Send {
    /// Queue records for the next submission. `Err(RingFull)` when the
    /// queue cannot take all of them.
    fn push(&mut self, records: &[SubmitRecord]) -> Result<()>;

    /// Hand queued records to the kernel. Returns how many were consumed.
    fn submit(&mut self) -> Result<usize>;

    /// Submit queued records and wait for at least `want` completions, or
    /// until `timeout` elapses. An elapsed timeout is not an error.
    fn submit_and_wait(&mut self, want: usize, timeout: Option<Duration>) -> Result<usize>;

    /// Move every ready completion into `out`. Returns how many were added.
    fn drain(&mut self, out: &mut Vec<CompletionRecord>) -> usize;

    /// Records pushed but not yet submitted.
    fn queued(&self) -> usize;

    /// Submission queue size.
    fn capacity(&self) -> usize;

    /// Release the ring. Further calls fail with `RingError::Closed`.
    fn shutdown(&mut self);
}
