//! Exchange entries: one pooled object per in-flight kernel operation.
//!
//! An [`ExchangeEntry`] couples a kind-specific payload (the native
//! parameters of one operation) with the continuation that receives its
//! result. Every kind shares the same state machine:
//!
//! ```text
//!   FREE ──prepare──▶ PREPARED ──submit──▶ SUBMITTED ──complete──▶ COMPLETED
//!    ▲                                                                 │
//!    └──────────────────────────── close ◀────────────────────────────┘
//! ```
//!
//! `abort` takes PREPARED or SUBMITTED straight to COMPLETED with a
//! synthesized failure (ring full, shutdown). Any other transition is a
//! programming error and panics.
//!
//! Kinds differ only in which native fields they fill in and how they read
//! the raw result code; that is the [`ExchangeKind`] trait.

mod accept;
mod close;
mod connect;
mod delay;
mod guard;
mod listen;
mod nop;
mod open;
mod rw;
mod socket;
mod splice;
mod stat;
mod vector;

pub use accept::AcceptKind;
pub use close::CloseKind;
pub use connect::ConnectKind;
pub use delay::DelayKind;
pub use guard::{Expiry, TimeoutGuardKind};
pub use listen::{ListenKind, ListenParams};
pub use nop::NopKind;
pub use open::{OpenKind, OpenParams};
pub use rw::{ReadKind, WriteKind, MAX_RW_COUNT};
pub use socket::{SocketKind, SocketParams};
pub use splice::SpliceKind;
pub use stat::{StatKind, StatParams, StatTarget};
pub use vector::{ReadVectorKind, WriteVectorKind};

use std::fmt;

use proactor_core::error::{Failure, IoResult};
use proactor_core::flags::SubmitFlags;
use proactor_core::submission::SubmitRecord;

use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;
use crate::proactor::Proactor;

/// Receives the outcome of one operation, exactly once, on the reactor thread.
pub type Continuation<T> = Box<dyn FnOnce(IoResult<T>, &mut Proactor) + Send>;

/// Closed set of operation kinds. Registry entries carry one of these so a
/// completion can be routed to the right pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Nop,
    Delay,
    TimeoutGuard,
    Close,
    Read,
    Write,
    ReadVector,
    WriteVector,
    Splice,
    Open,
    Socket,
    Listen,
    Accept,
    Connect,
    Stat,
}

impl OpKind {
    pub const ALL: [OpKind; 15] = [
        OpKind::Nop,
        OpKind::Delay,
        OpKind::TimeoutGuard,
        OpKind::Close,
        OpKind::Read,
        OpKind::Write,
        OpKind::ReadVector,
        OpKind::WriteVector,
        OpKind::Splice,
        OpKind::Open,
        OpKind::Socket,
        OpKind::Listen,
        OpKind::Accept,
        OpKind::Connect,
        OpKind::Stat,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            OpKind::Nop => "nop",
            OpKind::Delay => "delay",
            OpKind::TimeoutGuard => "timeout-guard",
            OpKind::Close => "close",
            OpKind::Read => "read",
            OpKind::Write => "write",
            OpKind::ReadVector => "read-vector",
            OpKind::WriteVector => "write-vector",
            OpKind::Splice => "splice",
            OpKind::Open => "open",
            OpKind::Socket => "socket",
            OpKind::Listen => "listen",
            OpKind::Accept => "accept",
            OpKind::Connect => "connect",
            OpKind::Stat => "stat",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind-specific half of an exchange entry.
///
/// **Contract:**
/// - `new()` allocates no native memory; that happens in `prepare()`.
/// - `render()` is a pure transformation into the blank record it is given.
/// - `translate()` runs once per completion, on the reactor thread.
/// - `recycle()` drops per-operation state; fixed native blocks may be kept
///   for the next operation of the same kind.
/// - `dispose()` frees everything.
pub trait ExchangeKind: Sized + Send + 'static {
    const KIND: OpKind;

    /// Parameters accepted by `prepare`.
    type Params: Send;
    /// Success payload delivered to the continuation.
    type Output: Send + 'static;

    fn new() -> Self;

    /// Write `params` into native memory. Errors never reach the kernel.
    fn prepare(&mut self, params: Self::Params) -> IoResult<()>;

    fn render(&self, record: &mut SubmitRecord);

    /// Interpret a raw result code: negative is `-errno`.
    fn translate(&mut self, result: i32, flags: u32) -> IoResult<Self::Output>;

    fn recycle(&mut self) {}

    fn dispose(&mut self) {
        self.recycle();
    }

    /// The factory pool holding entries of this kind.
    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self>;
}

/// Lifecycle state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    Free,
    Prepared,
    Submitted,
    Completed,
}

/// A result ready to hand to its continuation.
///
/// Produced while the entry is borrowed from its pool, delivered after
/// the borrow ends so the continuation can use the proactor freely.
#[must_use = "a completion must be delivered to keep the exactly-once contract"]
pub struct Completion<T> {
    continuation: Option<Continuation<T>>,
    result: IoResult<T>,
}

impl<T> Completion<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn deliver(self, proactor: &mut Proactor) {
        if let Some(continuation) = self.continuation {
            continuation(self.result, proactor);
        }
    }
}

/// One pooled operation slot.
pub struct ExchangeEntry<K: ExchangeKind> {
    state: EntryState,
    tag: Option<u32>,
    flags: SubmitFlags,
    continuation: Option<Continuation<K::Output>>,
    payload: K,
}

impl<K: ExchangeKind> ExchangeEntry<K> {
    pub fn new() -> Self {
        Self {
            state: EntryState::Free,
            tag: None,
            flags: SubmitFlags::empty(),
            continuation: None,
            payload: K::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> EntryState {
        self.state
    }

    #[inline]
    pub fn tag(&self) -> Option<u32> {
        self.tag
    }

    #[inline]
    pub fn flags(&self) -> SubmitFlags {
        self.flags
    }

    pub fn payload(&self) -> &K {
        &self.payload
    }

    fn expect_state(&self, allowed: &[EntryState], action: &str) {
        assert!(
            allowed.contains(&self.state),
            "{} entry: {} while {:?}",
            K::KIND,
            action,
            self.state
        );
    }

    /// Store the continuation and write the native parameters.
    ///
    /// The entry is PREPARED even when the payload rejects `params`, so the
    /// caller can `abort` it and the continuation still fires once.
    ///
    /// # Panics
    /// If the entry is not FREE.
    pub fn prepare(
        &mut self,
        params: K::Params,
        continuation: Continuation<K::Output>,
    ) -> IoResult<()> {
        self.expect_state(&[EntryState::Free], "prepare");
        self.continuation = Some(continuation);
        self.state = EntryState::Prepared;
        self.payload.prepare(params)
    }

    pub fn assign_tag(&mut self, tag: u32) {
        self.tag = Some(tag);
    }

    /// Make the kernel cancel this operation if the next submission (its
    /// timeout guard) fires first, and the reverse.
    pub fn link(&mut self) {
        self.flags |= SubmitFlags::IO_LINK;
    }

    /// Render into `record`, which is reset first.
    pub fn render(&self, record: &mut SubmitRecord) {
        record.clear();
        self.payload.render(record);
        record.flags |= self.flags;
        record.user_data = u64::from(self.tag.unwrap_or(u32::MAX));
    }

    pub fn mark_submitted(&mut self) {
        self.expect_state(&[EntryState::Prepared], "submit");
        self.state = EntryState::Submitted;
    }

    /// Translate a kernel completion and hand back the continuation.
    ///
    /// # Panics
    /// If the entry was never submitted.
    pub fn complete(&mut self, result: i32, flags: u32) -> Completion<K::Output> {
        self.expect_state(&[EntryState::Submitted], "complete");
        let result = self.payload.translate(result, flags);
        self.finish(result)
    }

    /// Finish with a synthesized failure instead of a kernel result.
    pub fn abort(&mut self, failure: Failure) -> Completion<K::Output> {
        self.expect_state(&[EntryState::Prepared, EntryState::Submitted], "abort");
        self.finish(Err(failure))
    }

    fn finish(&mut self, result: IoResult<K::Output>) -> Completion<K::Output> {
        self.state = EntryState::Completed;
        Completion {
            continuation: self.continuation.take(),
            result,
        }
    }

    /// Recycle: drop per-operation state and return to FREE.
    ///
    /// # Panics
    /// If the operation is still pending.
    pub fn close(&mut self) {
        self.expect_state(&[EntryState::Free, EntryState::Completed], "close");
        self.payload.recycle();
        self.reset();
    }

    /// Free every native resource regardless of state. Used by pool `clear`.
    pub fn dispose(&mut self) {
        self.payload.dispose();
        self.reset();
    }

    fn reset(&mut self) {
        self.continuation = None;
        self.tag = None;
        self.flags = SubmitFlags::empty();
        self.state = EntryState::Free;
    }
}

impl<K: ExchangeKind> Default for ExchangeEntry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ExchangeKind> fmt::Debug for ExchangeEntry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeEntry")
            .field("kind", &K::KIND)
            .field("state", &self.state)
            .field("tag", &self.tag)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Map a raw result code: negative is a native failure, otherwise `ok(result)`.
#[inline]
pub(crate) fn check<T>(result: i32, ok: impl FnOnce(u32) -> T) -> IoResult<T> {
    if result < 0 {
        Err(Failure::native(result))
    } else {
        Ok(ok(result as u32))
    }
}
