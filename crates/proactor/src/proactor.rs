//! # Proactor: request, submit, reap, dispatch
//!
//! The proactor owns the ring backend, the entry factory and the completion
//! registry, and runs entirely on one thread. Each cycle of
//! [`Proactor::process_completions`]:
//!
//! 1. Runs requests queued by other threads through a [`ProactorHandle`]
//! 2. Re-arms the wake-up poll on the notifier's eventfd
//! 3. Pushes every staged submission and enters the kernel once
//! 4. Drains completions, resolves each tag, and delivers the result
//!
//! Requests made between cycles are staged and go to the kernel together.
//! Completions are delivered in kernel order, not submission order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use proactor_core::backend::RingBackend;
use proactor_core::error::{Failure, IoResult, Resource, RingError};
use proactor_core::handle::{
    BufferSpan, ConnectionContext, FileDescriptor, IoVectorSpan, ListenContext, OffsetT, SizeT,
    SpliceDescriptor,
};
use proactor_core::notifier::{Notifier, NullNotifier};
use proactor_core::flags::SocketFlag;
use proactor_core::promise::Promise;
use proactor_core::stat::FileStat;
use proactor_core::submission::{CompletionRecord, Opcode, SubmitRecord, WAKE_USER_DATA};
use proactor_core::timeout::Timeout;
use proactor_module::{EventFdNotifier, UringBackend};

use crate::config::ProactorConfig;
use crate::exchange::*;
use crate::factory::ExchangeEntryFactory;
use crate::reactor::{Inbox, ProactorHandle};
use crate::registry::{CompletionRegistry, EntryRef};

/// Run `$body` with `$k` bound to the exchange kind named by `$kind`.
macro_rules! with_kind {
    ($kind:expr, $k:ident => $body:expr) => {
        match $kind {
            OpKind::Nop => { type $k = NopKind; $body }
            OpKind::Delay => { type $k = DelayKind; $body }
            OpKind::TimeoutGuard => { type $k = TimeoutGuardKind; $body }
            OpKind::Close => { type $k = CloseKind; $body }
            OpKind::Read => { type $k = ReadKind; $body }
            OpKind::Write => { type $k = WriteKind; $body }
            OpKind::ReadVector => { type $k = ReadVectorKind; $body }
            OpKind::WriteVector => { type $k = WriteVectorKind; $body }
            OpKind::Splice => { type $k = SpliceKind; $body }
            OpKind::Open => { type $k = OpenKind; $body }
            OpKind::Socket => { type $k = SocketKind; $body }
            OpKind::Listen => { type $k = ListenKind; $body }
            OpKind::Accept => { type $k = AcceptKind; $body }
            OpKind::Connect => { type $k = ConnectKind; $body }
            OpKind::Stat => { type $k = StatKind; $body }
        }
    };
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProactorStats {
    /// Records staged for the kernel, guards included.
    pub submitted: u64,
    /// Kernel completions dispatched to entries.
    pub completed: u64,
    pub guards_fired: u64,
    pub guards_disarmed: u64,
    /// Failures synthesized for operations still in flight at shutdown.
    pub synthesized: u64,
    /// Wake-up polls that fired.
    pub wakeups: u64,
}

impl ProactorStats {
    fn record_guard(&mut self, outcome: &IoResult<Expiry>) {
        match outcome {
            Ok(Expiry::Fired) => self.guards_fired += 1,
            Ok(Expiry::Disarmed) => self.guards_disarmed += 1,
            Err(_) => {}
        }
    }
}

pub struct Proactor {
    backend: Box<dyn RingBackend>,
    factory: ExchangeEntryFactory,
    registry: CompletionRegistry,
    /// Rendered records waiting for the next push.
    staged: Vec<SubmitRecord>,
    completions: Vec<CompletionRecord>,
    inbox: Arc<Inbox>,
    config: ProactorConfig,
    stats: ProactorStats,
    wake_armed: bool,
    closed: bool,
    /// Continuations are running over a batch whose tags are already in hand.
    dispatching: bool,
    /// `shutdown` was called while dispatching; finish it once the batch is done.
    shutdown_deferred: bool,
}

impl Proactor {
    /// io_uring backend, plus an eventfd notifier when `config.wake_poll` is set.
    pub fn new(config: ProactorConfig) -> Result<Self, RingError> {
        let backend = UringBackend::new(config.backend())?;
        let notifier: Arc<dyn Notifier> = if config.wake_poll {
            Arc::new(EventFdNotifier::create()?)
        } else {
            Arc::new(NullNotifier)
        };
        Ok(Self::with_backend(Box::new(backend), notifier, config))
    }

    pub fn with_backend(
        backend: Box<dyn RingBackend>,
        notifier: Arc<dyn Notifier>,
        config: ProactorConfig,
    ) -> Self {
        debug!(
            sq_entries = backend.capacity(),
            pool_ceiling = ?config.pool_ceiling,
            "proactor ready"
        );
        Self {
            staged: Vec::with_capacity(backend.capacity()),
            completions: Vec::with_capacity(config.completion_batch),
            backend,
            factory: ExchangeEntryFactory::new(config.pool_ceiling),
            registry: CompletionRegistry::with_capacity(config.sq_entries as usize),
            inbox: Arc::new(Inbox::new(config.inbox_capacity, notifier)),
            config,
            stats: ProactorStats::default(),
            wake_armed: false,
            closed: false,
            dispatching: false,
            shutdown_deferred: false,
        }
    }

    /// A cloneable, thread-safe handle for requesting work from other threads.
    pub fn handle(&self) -> ProactorHandle {
        ProactorHandle::new(Arc::clone(&self.inbox))
    }

    pub fn config(&self) -> &ProactorConfig {
        &self.config
    }

    pub fn stats(&self) -> ProactorStats {
        self.stats
    }

    pub fn factory(&self) -> &ExchangeEntryFactory {
        &self.factory
    }

    /// Operations registered and not yet completed, guards included.
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ── Request surface ──

    /// Liveness ping through the ring.
    pub fn nop(&mut self, continuation: impl FnOnce(IoResult<()>, &mut Proactor) + Send + 'static) {
        self.request::<NopKind>((), None, Box::new(continuation));
    }

    /// Sleep for `timeout`. Succeeds with the measured elapsed time.
    pub fn delay(
        &mut self,
        timeout: Timeout,
        continuation: impl FnOnce(IoResult<Duration>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<DelayKind>(timeout, None, Box::new(continuation));
    }

    pub fn close(
        &mut self,
        fd: FileDescriptor,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<()>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<CloseKind>(fd, timeout, Box::new(continuation));
    }

    /// Read into `buffer` at `offset`. Lengths above [`MAX_RW_COUNT`] are clamped.
    ///
    /// # Safety
    /// The memory named by `buffer` must stay valid, and must not be read or
    /// written by anyone else, until the continuation runs.
    pub unsafe fn read(
        &mut self,
        fd: FileDescriptor,
        buffer: BufferSpan,
        offset: OffsetT,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<SizeT>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<ReadKind>((fd, buffer, offset), timeout, Box::new(continuation));
    }

    /// Write `buffer` at `offset`. Lengths above [`MAX_RW_COUNT`] are clamped.
    ///
    /// # Safety
    /// The memory named by `buffer` must stay valid and unmodified until the
    /// continuation runs.
    pub unsafe fn write(
        &mut self,
        fd: FileDescriptor,
        buffer: BufferSpan,
        offset: OffsetT,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<SizeT>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<WriteKind>((fd, buffer, offset), timeout, Box::new(continuation));
    }

    /// Scatter read into the `iovec` array named by `vector`.
    ///
    /// # Safety
    /// The array and every buffer it points at must stay valid, and be left
    /// alone, until the continuation runs.
    pub unsafe fn read_vector(
        &mut self,
        fd: FileDescriptor,
        vector: IoVectorSpan,
        offset: OffsetT,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<SizeT>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<ReadVectorKind>((fd, vector, offset), timeout, Box::new(continuation));
    }

    /// Gather write from the `iovec` array named by `vector`.
    ///
    /// # Safety
    /// As for [`Proactor::read_vector`].
    pub unsafe fn write_vector(
        &mut self,
        fd: FileDescriptor,
        vector: IoVectorSpan,
        offset: OffsetT,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<SizeT>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<WriteVectorKind>((fd, vector, offset), timeout, Box::new(continuation));
    }

    pub fn splice(
        &mut self,
        descriptor: SpliceDescriptor,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<SizeT>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<SpliceKind>(descriptor, timeout, Box::new(continuation));
    }

    pub fn open(
        &mut self,
        params: OpenParams,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<FileDescriptor>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<OpenKind>(params, timeout, Box::new(continuation));
    }

    pub fn socket(
        &mut self,
        params: SocketParams,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<FileDescriptor>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<SocketKind>(params, timeout, Box::new(continuation));
    }

    /// Create, bind and listen. The context carries the address actually bound.
    pub fn listen(
        &mut self,
        params: ListenParams,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<ListenContext>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<ListenKind>(params, timeout, Box::new(continuation));
    }

    pub fn accept(
        &mut self,
        socket: FileDescriptor,
        flags: SocketFlag,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<ConnectionContext>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<AcceptKind>((socket, flags), timeout, Box::new(continuation));
    }

    pub fn connect(
        &mut self,
        socket: FileDescriptor,
        address: std::net::SocketAddr,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<FileDescriptor>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<ConnectKind>((socket, address), timeout, Box::new(continuation));
    }

    pub fn stat(
        &mut self,
        params: StatParams,
        timeout: Option<Timeout>,
        continuation: impl FnOnce(IoResult<FileStat>, &mut Proactor) + Send + 'static,
    ) {
        self.request::<StatKind>(params, timeout, Box::new(continuation));
    }

    /// Prepare, register and stage one operation, optionally guarded by a
    /// linked timeout. Any failure before staging goes to the continuation.
    pub(crate) fn request<K: ExchangeKind>(
        &mut self,
        params: K::Params,
        timeout: Option<Timeout>,
        continuation: Continuation<K::Output>,
    ) {
        // Linked pairs must land in the same push. Make room before anything
        // is registered: rejected continuations may shut the proactor down.
        let needed = if timeout.is_some() { 2 } else { 1 };
        if self.staged.len() + needed > self.backend.capacity() {
            self.flush();
        }
        if self.closed {
            return continuation(Err(Failure::Closed), self);
        }
        let slot = match self.factory.alloc::<K>() {
            Ok(slot) => slot,
            Err(failure) => return continuation(Err(failure), self),
        };
        if let Err(failure) = self.factory.entry::<K>(slot).prepare(params, continuation) {
            return self.abort_slot::<K>(slot, failure);
        }
        let tag = self.registry.register(EntryRef::new(K::KIND, slot));
        self.factory.entry::<K>(slot).assign_tag(tag);

        let guard = match timeout.map(|t| self.prepare_guard(t)).transpose() {
            Ok(guard) => guard,
            Err(failure) => {
                self.registry.resolve(tag);
                return self.abort_slot::<K>(slot, failure);
            }
        };

        let mut record = SubmitRecord::default();
        let entry = self.factory.entry::<K>(slot);
        if guard.is_some() {
            entry.link();
        }
        entry.render(&mut record);
        entry.mark_submitted();
        self.staged.push(record);

        if let Some(guard_slot) = guard {
            let entry = self.factory.entry::<TimeoutGuardKind>(guard_slot);
            entry.render(&mut record);
            entry.mark_submitted();
            self.staged.push(record);
        }
        self.stats.submitted += needed as u64;
        trace!(kind = %K::KIND, tag, slot, linked = guard.is_some(), "staged");
    }

    /// Allocate, prepare and register a timeout guard. Returns its slot.
    fn prepare_guard(&mut self, timeout: Timeout) -> IoResult<u32> {
        let slot = self.factory.alloc::<TimeoutGuardKind>()?;
        let on_expiry: Continuation<Expiry> =
            Box::new(|outcome, proactor| proactor.stats.record_guard(&outcome));

        let entry = self.factory.entry::<TimeoutGuardKind>(slot);
        if let Err(failure) = entry.prepare(timeout, on_expiry) {
            let completion = entry.abort(failure.clone());
            self.factory.release::<TimeoutGuardKind>(slot);
            completion.deliver(self);
            return Err(failure);
        }
        let tag = self.registry.register(EntryRef::new(OpKind::TimeoutGuard, slot));
        self.factory.entry::<TimeoutGuardKind>(slot).assign_tag(tag);
        Ok(slot)
    }

    // ── Completion path ──

    fn complete_slot<K: ExchangeKind>(&mut self, slot: u32, result: i32, flags: u32) {
        let completion = self.factory.entry::<K>(slot).complete(result, flags);
        self.factory.release::<K>(slot);
        completion.deliver(self);
    }

    fn abort_slot<K: ExchangeKind>(&mut self, slot: u32, failure: Failure) {
        let completion = self.factory.entry::<K>(slot).abort(failure);
        self.factory.release::<K>(slot);
        completion.deliver(self);
    }

    fn dispatch(&mut self, entry: EntryRef, result: i32, flags: u32) {
        with_kind!(entry.kind, K => self.complete_slot::<K>(entry.slot, result, flags))
    }

    fn abort_entry(&mut self, entry: EntryRef, failure: Failure) {
        with_kind!(entry.kind, K => self.abort_slot::<K>(entry.slot, failure))
    }

    /// Run one reactor cycle. Blocks in the kernel until at least one
    /// completion arrives or `timeout` elapses (`None` waits indefinitely
    /// while anything is in flight). Returns the completions delivered.
    pub fn process_completions(&mut self, timeout: Option<Timeout>) -> Result<usize, RingError> {
        self.run_inbox();
        // A handle asked for shutdown without going through the queue.
        if !self.closed && self.inbox.is_closed() {
            let _ = self.shutdown();
        }
        // A queued task may have shut the proactor down and released the ring.
        if self.closed && self.registry.is_empty() {
            return Ok(0);
        }
        self.arm_wake();
        self.flush();
        // A rejected submission's continuation may have shut the proactor down.
        if self.closed && self.registry.is_empty() {
            return Ok(0);
        }

        let want = usize::from(!self.registry.is_empty() || self.wake_armed);
        if let Err(error) = self
            .backend
            .submit_and_wait(want, timeout.map(Timeout::as_duration))
        {
            error!(%error, "ring submit failed");
            return Err(error);
        }
        Ok(self.reap())
    }

    fn reap(&mut self) -> usize {
        let mut batch = std::mem::take(&mut self.completions);
        self.backend.drain(&mut batch);

        let outer = self.begin_dispatch();
        let mut delivered = 0;
        for cqe in &batch {
            if cqe.user_data == WAKE_USER_DATA {
                self.wake_armed = false;
                self.stats.wakeups += 1;
                if let Err(error) = self.inbox.notifier.acknowledge() {
                    warn!(%error, "wake acknowledge failed");
                }
                continue;
            }
            let tag = u32::try_from(cqe.user_data).unwrap_or(u32::MAX);
            let entry = self.registry.resolve(tag);
            trace!(kind = %entry.kind, tag, result = cqe.result, "completed");
            self.stats.completed += 1;
            self.dispatch(entry, cqe.result, cqe.flags);
            delivered += 1;
        }

        batch.clear();
        self.completions = batch;
        self.end_dispatch(outer);
        delivered
    }

    /// Enter a section that holds resolved tags. Returns the previous state
    /// for [`Proactor::end_dispatch`].
    fn begin_dispatch(&mut self) -> bool {
        std::mem::replace(&mut self.dispatching, true)
    }

    /// Leave a dispatch section, completing a shutdown requested inside the
    /// outermost one.
    fn end_dispatch(&mut self, outer: bool) {
        self.dispatching = outer;
        if !outer && self.shutdown_deferred {
            self.shutdown_deferred = false;
            self.finish_shutdown();
        }
    }

    /// Run requests queued by other threads, at most `completion_batch` per cycle.
    fn run_inbox(&mut self) {
        let inbox = Arc::clone(&self.inbox);
        for _ in 0..self.config.completion_batch.max(1) {
            match inbox.pop() {
                Some(task) => task.run(self),
                None => break,
            }
        }
    }

    fn arm_wake(&mut self) {
        if self.wake_armed || self.closed {
            return;
        }
        if let Some(fd) = self.inbox.notifier.poll_descriptor() {
            self.staged.push(SubmitRecord {
                opcode: Opcode::PollAdd,
                fd,
                op_flags: libc::POLLIN as u32,
                user_data: WAKE_USER_DATA,
                ..Default::default()
            });
            self.wake_armed = true;
        }
    }

    /// Push staged records to the backend. If the ring refuses them, every
    /// staged operation fails through its continuation.
    fn flush(&mut self) {
        if self.staged.is_empty() {
            return;
        }
        let mut outcome = self.backend.push(&self.staged);
        if matches!(outcome, Err(RingError::RingFull)) {
            // Hand what is already queued to the kernel to make room.
            outcome = self
                .backend
                .submit()
                .and_then(|_| self.backend.push(&self.staged));
        }

        let failure = match outcome {
            Ok(()) => {
                self.staged.clear();
                return;
            }
            Err(RingError::RingFull) => Failure::Exhausted(Resource::SubmissionQueue),
            Err(RingError::Closed) => Failure::Closed,
            Err(RingError::Setup(errno) | RingError::Submit(errno) | RingError::Os(errno)) => {
                Failure::native(errno)
            }
        };
        warn!(count = self.staged.len(), %failure, "ring rejected staged submissions");

        let outer = self.begin_dispatch();
        let mut rejected = std::mem::take(&mut self.staged);
        for record in &rejected {
            if record.user_data == WAKE_USER_DATA {
                self.wake_armed = false;
                continue;
            }
            let entry = self.registry.resolve(record.user_data as u32);
            self.abort_entry(entry, failure.clone());
        }
        rejected.clear();
        if self.staged.is_empty() {
            self.staged = rejected;
        }
        self.end_dispatch(outer);
    }

    /// Stop accepting work, drain in-flight operations for up to
    /// `shutdown_drain`, release the ring, and fail whatever is left with
    /// `Failure::Closed`. Idempotent: every call returns the same promise,
    /// resolved once all resources are released.
    ///
    /// Called from a continuation, new requests fail at once but the rest
    /// of the current completion batch is still delivered with its kernel
    /// results before draining starts.
    ///
    /// An operation the kernel has not reported by the time the ring is
    /// released gets `Failure::Closed`. If it had already created a
    /// descriptor (socket, accept, open), that descriptor is not recovered.
    pub fn shutdown(&mut self) -> Promise<()> {
        let terminated = self.inbox.terminated();
        if self.closed {
            return terminated;
        }
        self.closed = true;
        self.inbox.close();
        if self.dispatching {
            debug!("shutdown deferred until the current batch is delivered");
            self.shutdown_deferred = true;
        } else {
            self.finish_shutdown();
        }
        terminated
    }

    fn finish_shutdown(&mut self) {
        debug!(in_flight = self.registry.len(), "proactor shutting down");

        // Requests already queued by other threads now fail with Closed.
        while let Some(task) = self.inbox.pop() {
            task.run(self);
        }

        let deadline = Instant::now() + self.config.shutdown_drain.as_duration();
        while !self.registry.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if self.process_completions(Some(Timeout::from(deadline - now))).is_err() {
                break;
            }
        }
        // Completions the kernel posted after the last wait keep their real
        // results, including descriptors it created for socket and open.
        self.reap();

        self.backend.shutdown();
        self.staged.clear();
        self.wake_armed = false;

        let leftover = self.registry.drain();
        if !leftover.is_empty() {
            warn!(count = leftover.len(), "failing operations still in flight at shutdown");
        }
        for (_, entry) in leftover {
            self.stats.synthesized += 1;
            self.abort_entry(entry, Failure::Closed);
        }

        self.factory.clear();
        debug!(stats = ?self.stats, "proactor shut down");
        self.inbox.terminated().succeed(());
    }
}

impl Drop for Proactor {
    fn drop(&mut self) {
        // The ring must go before the memory it may still write into.
        if !self.closed {
            let _ = self.shutdown();
        }
    }
}
