//! # Reactor: the proactor on its own thread
//!
//! A [`Proactor`] is single-threaded. To use it from elsewhere:
//! 1. Other threads push deferred requests onto a lock-free MPMC inbox
//!    through a [`ProactorHandle`] and ring the notifier
//! 2. The reactor thread wakes from its kernel wait (the notifier's eventfd
//!    is polled on the same ring), runs the requests and submits them
//! 3. Each continuation resolves a [`Promise`] the caller is holding
//!
//! [`Reactor`] owns that thread.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use tracing::{debug, error, warn};

use proactor_core::error::{Failure, IoResult, Resource, RingError};
use proactor_core::flags::SocketFlag;
use proactor_core::handle::{
    BufferSpan, ConnectionContext, FileDescriptor, IoVectorSpan, ListenContext, OffsetT, SizeT,
    SpliceDescriptor,
};
use proactor_core::notifier::Notifier;
use proactor_core::promise::Promise;
use proactor_core::stat::FileStat;
use proactor_core::timeout::Timeout;

use crate::config::ProactorConfig;
use crate::exchange::{Continuation, ListenParams, OpenParams, SocketParams, StatParams};
use crate::proactor::Proactor;

/// Work queued for the reactor thread.
pub(crate) trait Deferred: Send {
    fn run(self: Box<Self>, proactor: &mut Proactor);

    /// The task will never run.
    fn reject(self: Box<Self>, failure: Failure);
}

struct Job<F>(F);

impl<F: FnOnce(&mut Proactor) + Send> Deferred for Job<F> {
    fn run(self: Box<Self>, proactor: &mut Proactor) {
        (self.0)(proactor)
    }

    fn reject(self: Box<Self>, failure: Failure) {
        warn!(%failure, "reactor task dropped without running");
    }
}

/// A request whose outcome resolves a promise.
struct Request<T, F> {
    promise: Promise<T>,
    body: F,
}

impl<T, F> Deferred for Request<T, F>
where
    T: Send + Sync + 'static,
    F: FnOnce(&mut Proactor, Continuation<T>) + Send,
{
    fn run(self: Box<Self>, proactor: &mut Proactor) {
        let promise = self.promise;
        (self.body)(
            proactor,
            Box::new(move |result, _| {
                promise.resolve(result);
            }),
        );
    }

    fn reject(self: Box<Self>, failure: Failure) {
        self.promise.fail(failure);
    }
}

/// Shared between the proactor and every handle.
pub(crate) struct Inbox {
    queue: ArrayQueue<Box<dyn Deferred>>,
    closed: AtomicBool,
    pub(crate) notifier: Arc<dyn Notifier>,
    terminated: Promise<()>,
}

impl Inbox {
    pub(crate) fn new(capacity: usize, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            closed: AtomicBool::new(false),
            notifier,
            terminated: Promise::new(),
        }
    }

    #[inline]
    pub(crate) fn pop(&self) -> Option<Box<dyn Deferred>> {
        self.queue.pop()
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolved once the proactor has released every resource.
    pub(crate) fn terminated(&self) -> Promise<()> {
        self.terminated.clone()
    }

    /// Queue `task` and wake the reactor. A refused task is told why and
    /// the same failure is returned.
    fn push(&self, task: Box<dyn Deferred>) -> IoResult<()> {
        if self.is_closed() {
            task.reject(Failure::Closed);
            return Err(Failure::Closed);
        }
        if let Err(task) = self.queue.push(task) {
            let failure = Failure::Exhausted(Resource::RequestQueue);
            task.reject(failure.clone());
            return Err(failure);
        }
        // The proactor may have drained the inbox between the check and the
        // push. Whatever is still queued will never run.
        if self.is_closed() {
            while let Some(task) = self.queue.pop() {
                task.reject(Failure::Closed);
            }
            return Ok(());
        }
        self.wake();
        Ok(())
    }

    /// Close to new work and wake the reactor so it shuts down on its next
    /// cycle. Needs no queue slot.
    pub(crate) fn request_shutdown(&self) {
        self.close();
        self.wake();
    }

    fn wake(&self) {
        if let Err(error) = self.notifier.notify() {
            warn!(%error, "reactor wake-up failed");
        }
    }
}

/// Thread-safe front end of a [`Proactor`]. Every request returns a
/// [`Promise`] resolved on the reactor thread.
#[derive(Clone)]
pub struct ProactorHandle {
    inbox: Arc<Inbox>,
}

impl ProactorHandle {
    pub(crate) fn new(inbox: Arc<Inbox>) -> Self {
        Self { inbox }
    }

    /// Run `task` on the reactor thread with the proactor. Fails with
    /// `Failure::Closed` after shutdown and with `Failure::Exhausted` when the
    /// inbox is full; the task is dropped in both cases.
    pub fn execute(&self, task: impl FnOnce(&mut Proactor) + Send + 'static) -> IoResult<()> {
        self.inbox.push(Box::new(Job(task)))
    }

    fn request<T>(
        &self,
        body: impl FnOnce(&mut Proactor, Continuation<T>) + Send + 'static,
    ) -> Promise<T>
    where
        T: Send + Sync + 'static,
    {
        let promise = Promise::new();
        // A refused request has already failed its promise.
        let _ = self.inbox.push(Box::new(Request {
            promise: promise.clone(),
            body,
        }));
        promise
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    pub fn nop(&self) -> Promise<()> {
        self.request(|p, k| p.nop(k))
    }

    pub fn delay(&self, timeout: Timeout) -> Promise<Duration> {
        self.request(move |p, k| p.delay(timeout, k))
    }

    pub fn close(&self, fd: FileDescriptor, timeout: Option<Timeout>) -> Promise<()> {
        self.request(move |p, k| p.close(fd, timeout, k))
    }

    /// # Safety
    /// As for [`Proactor::read`]: the buffer must outlive the promise.
    pub unsafe fn read(
        &self,
        fd: FileDescriptor,
        buffer: BufferSpan,
        offset: OffsetT,
        timeout: Option<Timeout>,
    ) -> Promise<SizeT> {
        self.request(move |p, k| p.read(fd, buffer, offset, timeout, k))
    }

    /// # Safety
    /// As for [`Proactor::write`].
    pub unsafe fn write(
        &self,
        fd: FileDescriptor,
        buffer: BufferSpan,
        offset: OffsetT,
        timeout: Option<Timeout>,
    ) -> Promise<SizeT> {
        self.request(move |p, k| p.write(fd, buffer, offset, timeout, k))
    }

    /// # Safety
    /// As for [`Proactor::read_vector`].
    pub unsafe fn read_vector(
        &self,
        fd: FileDescriptor,
        vector: IoVectorSpan,
        offset: OffsetT,
        timeout: Option<Timeout>,
    ) -> Promise<SizeT> {
        self.request(move |p, k| p.read_vector(fd, vector, offset, timeout, k))
    }

    /// # Safety
    /// As for [`Proactor::write_vector`].
    pub unsafe fn write_vector(
        &self,
        fd: FileDescriptor,
        vector: IoVectorSpan,
        offset: OffsetT,
        timeout: Option<Timeout>,
    ) -> Promise<SizeT> {
        self.request(move |p, k| p.write_vector(fd, vector, offset, timeout, k))
    }

    pub fn splice(&self, descriptor: SpliceDescriptor, timeout: Option<Timeout>) -> Promise<SizeT> {
        self.request(move |p, k| p.splice(descriptor, timeout, k))
    }

    pub fn open(&self, params: OpenParams, timeout: Option<Timeout>) -> Promise<FileDescriptor> {
        self.request(move |p, k| p.open(params, timeout, k))
    }

    pub fn socket(
        &self,
        params: SocketParams,
        timeout: Option<Timeout>,
    ) -> Promise<FileDescriptor> {
        self.request(move |p, k| p.socket(params, timeout, k))
    }

    pub fn listen(&self, params: ListenParams, timeout: Option<Timeout>) -> Promise<ListenContext> {
        self.request(move |p, k| p.listen(params, timeout, k))
    }

    pub fn accept(
        &self,
        socket: FileDescriptor,
        flags: SocketFlag,
        timeout: Option<Timeout>,
    ) -> Promise<ConnectionContext> {
        self.request(move |p, k| p.accept(socket, flags, timeout, k))
    }

    pub fn connect(
        &self,
        socket: FileDescriptor,
        address: SocketAddr,
        timeout: Option<Timeout>,
    ) -> Promise<FileDescriptor> {
        self.request(move |p, k| p.connect(socket, address, timeout, k))
    }

    pub fn stat(&self, params: StatParams, timeout: Option<Timeout>) -> Promise<FileStat> {
        self.request(move |p, k| p.stat(params, timeout, k))
    }

    /// Ask the reactor to shut the proactor down. Resolves once it has.
    /// Requests made after this call fail with `Failure::Closed`.
    pub fn shutdown(&self) -> Promise<()> {
        self.inbox.request_shutdown();
        self.inbox.terminated()
    }
}

const IDLE_BACKOFF: Duration = Duration::from_micros(50);

/// Runs a [`Proactor`] on a dedicated OS thread.
pub struct Reactor {
    handle: ProactorHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl Reactor {
    /// Build a proactor from `config` and start it.
    pub fn start(config: ProactorConfig) -> Result<Self, RingError> {
        Self::spawn(Proactor::new(config)?)
    }

    /// Move `proactor` onto a new reactor thread.
    pub fn spawn(mut proactor: Proactor) -> Result<Self, RingError> {
        let handle = proactor.handle();
        let wait = proactor.config().wait_timeout;
        let wake_poll = proactor.config().wake_poll;

        let thread = thread::Builder::new()
            .name("proactor-reactor".into())
            .spawn(move || {
                debug!("reactor started");
                while !proactor.is_closed() {
                    match proactor.process_completions(Some(wait)) {
                        // Without a wake poll the kernel wait returns at once
                        // when idle, so back off instead of spinning.
                        Ok(0) if !wake_poll && proactor.in_flight() == 0 => {
                            thread::sleep(IDLE_BACKOFF);
                        }
                        Ok(_) => {}
                        Err(error) => {
                            error!(%error, "reactor cycle failed, shutting down");
                            break;
                        }
                    }
                }
                let _ = proactor.shutdown();
                debug!(stats = ?proactor.stats(), "reactor stopped");
            })
            .map_err(|e| RingError::Os(RingError::errno_of(&e)))?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> ProactorHandle {
        self.handle.clone()
    }

    /// Shut the proactor down and join the reactor thread.
    pub fn shutdown(&mut self) -> Promise<()> {
        let terminated = self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("reactor thread panicked");
            }
        }
        terminated
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Resolve `promise` from a proactor continuation.
pub fn resolver<T>(promise: &Promise<T>) -> impl FnOnce(IoResult<T>, &mut Proactor) + Send + 'static
where
    T: Send + Sync + 'static,
{
    let promise = promise.clone();
    move |result, _| {
        promise.resolve(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proactor_core::notifier::NullNotifier;
    use std::sync::atomic::AtomicUsize;

    struct CountingNotifier(AtomicUsize);

    impl Notifier for CountingNotifier {
        fn notify(&self) -> proactor_core::error::Result<()> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[test]
    fn test_push_notifies() {
        let notifier = Arc::new(CountingNotifier(AtomicUsize::new(0)));
        let inbox = Inbox::new(4, notifier.clone());
        let handle = ProactorHandle::new(Arc::new(inbox));
        let _ = handle.nop();
        let _ = handle.nop();
        assert_eq!(notifier.0.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_full_inbox_rejects() {
        let handle = ProactorHandle::new(Arc::new(Inbox::new(1, Arc::new(NullNotifier))));
        let first = handle.nop();
        let second = handle.nop();
        assert!(first.peek().is_none());
        assert_eq!(
            second.peek(),
            Some(Err(Failure::Exhausted(Resource::RequestQueue)))
        );
    }

    #[test]
    fn test_closed_inbox_rejects() {
        let inbox = Arc::new(Inbox::new(4, Arc::new(NullNotifier)));
        let handle = ProactorHandle::new(Arc::clone(&inbox));
        let queued = handle.delay(Timeout::from_secs(1));
        inbox.close();
        let late = handle.nop();
        assert_eq!(late.peek(), Some(Err(Failure::Closed)));
        // Queued before close: still waiting for the proactor to run it.
        assert!(queued.peek().is_none());
        assert!(handle.is_closed());
    }

    #[test]
    fn test_rejected_job_never_runs() {
        let inbox = Arc::new(Inbox::new(4, Arc::new(NullNotifier)));
        inbox.close();
        let handle = ProactorHandle::new(Arc::clone(&inbox));
        assert_eq!(handle.execute(|_| panic!("ran after close")), Err(Failure::Closed));
        assert!(inbox.pop().is_none());
    }

    #[test]
    fn test_execute_reports_full_inbox() {
        let handle = ProactorHandle::new(Arc::new(Inbox::new(1, Arc::new(NullNotifier))));
        assert_eq!(handle.execute(|_| {}), Ok(()));
        assert_eq!(
            handle.execute(|_| panic!("ran without a slot")),
            Err(Failure::Exhausted(Resource::RequestQueue))
        );
    }

    #[test]
    fn test_shutdown_needs_no_queue_slot() {
        let notifier = Arc::new(CountingNotifier(AtomicUsize::new(0)));
        let inbox = Arc::new(Inbox::new(1, notifier.clone()));
        let handle = ProactorHandle::new(Arc::clone(&inbox));
        let queued = handle.nop();
        assert!(queued.peek().is_none());

        let terminated = handle.shutdown();
        assert!(inbox.is_closed());
        assert!(terminated.peek().is_none());
        assert_eq!(notifier.0.load(Ordering::Relaxed), 2);
        assert_eq!(handle.nop().peek(), Some(Err(Failure::Closed)));
    }
}
