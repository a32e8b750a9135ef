//! Single-resolution completion cell.
//!
//! A [`Promise`] starts pending and is resolved at most once. The first
//! resolution wins; later attempts are ignored. Continuations attached
//! before resolution run on the resolving thread (the reactor, in normal
//! use) right after the value is stored; continuations attached afterwards
//! run immediately on the attaching thread. Every continuation observes the
//! same stored result.
//!
//! Besides callbacks, a promise can be awaited (`impl Future`) or waited on
//! with [`Promise::join`] from a thread that is not driving the reactor.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Failure, IoResult};

type Action<T> = Box<dyn FnOnce(&IoResult<T>) + Send>;

enum State<T> {
    Pending {
        actions: Vec<Action<T>>,
        wakers: Vec<Waker>,
    },
    Resolved(Arc<IoResult<T>>),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    resolved: Condvar,
}

/// A shared, single-resolution result cell.
///
/// Cloning yields another handle to the same cell.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Promise<T> {
    /// A pending promise.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending {
                    actions: Vec::new(),
                    wakers: Vec::new(),
                }),
                resolved: Condvar::new(),
            }),
        }
    }

    /// A promise already holding `result`.
    pub fn resolved(result: IoResult<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Resolved(Arc::new(result))),
                resolved: Condvar::new(),
            }),
        }
    }

    pub fn success(value: T) -> Self {
        Self::resolved(Ok(value))
    }

    pub fn failure(cause: Failure) -> Self {
        Self::resolved(Err(cause))
    }

    /// Store `result` if the promise is still pending.
    ///
    /// Returns `false` (and drops `result`) when already resolved.
    pub fn resolve(&self, result: IoResult<T>) -> bool {
        let stored = Arc::new(result);

        let previous = {
            let mut state = self.inner.state.lock();
            if matches!(*state, State::Resolved(_)) {
                return false;
            }
            std::mem::replace(&mut *state, State::Resolved(Arc::clone(&stored)))
        };
        self.inner.resolved.notify_all();

        // Run outside the lock so actions may attach to this promise again.
        if let State::Pending { actions, wakers } = previous {
            for action in actions {
                action(&stored);
            }
            for waker in wakers {
                waker.wake();
            }
        }
        true
    }

    pub fn succeed(&self, value: T) -> bool {
        self.resolve(Ok(value))
    }

    pub fn fail(&self, cause: Failure) -> bool {
        self.resolve(Err(cause))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Resolved(_))
    }

    /// Attach a continuation observing the result.
    pub fn on_result(&self, action: impl FnOnce(&IoResult<T>) + Send + 'static) -> &Self {
        let stored = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending { actions, .. } => {
                    actions.push(Box::new(action));
                    return self;
                }
                State::Resolved(stored) => Arc::clone(stored),
            }
        };
        action(&stored);
        self
    }

    pub fn on_success(&self, action: impl FnOnce(&T) + Send + 'static) -> &Self {
        self.on_result(move |result| {
            if let Ok(value) = result {
                action(value);
            }
        })
    }

    pub fn on_failure(&self, action: impl FnOnce(&Failure) + Send + 'static) -> &Self {
        self.on_result(move |result| {
            if let Err(cause) = result {
                action(cause);
            }
        })
    }

    /// A promise resolved with `mapper` applied to this one's success value.
    /// Failures pass through; `mapper` never sees them.
    pub fn map<U, F>(&self, mapper: F) -> Promise<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        let mapped = Promise::new();
        let target = mapped.clone();
        self.on_result(move |result| {
            target.resolve(result.as_ref().map(mapper).map_err(Clone::clone));
        });
        mapped
    }

    /// Chain a dependent asynchronous step.
    pub fn flat_map<U, F>(&self, mapper: F) -> Promise<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(&T) -> Promise<U> + Send + 'static,
    {
        let chained = Promise::new();
        let target = chained.clone();
        self.on_result(move |result| match result {
            Ok(value) => {
                mapper(value).on_result(move |inner| {
                    target.resolve(inner.clone());
                });
            }
            Err(cause) => {
                target.resolve(Err(cause.clone()));
            }
        });
        chained
    }
}

impl<T: Clone + Send + Sync + 'static> Promise<T> {
    /// Block the calling thread until resolved.
    ///
    /// Must not be called on the reactor thread for a promise that only
    /// the reactor can resolve.
    pub fn join(&self) -> IoResult<T> {
        let mut state = self.inner.state.lock();
        loop {
            if let State::Resolved(stored) = &*state {
                return (**stored).clone();
            }
            self.inner.resolved.wait(&mut state);
        }
    }

    /// Like [`join`](Self::join) but gives up after `timeout`.
    pub fn join_timeout(&self, timeout: Duration) -> Option<IoResult<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if let State::Resolved(stored) = &*state {
                return Some((**stored).clone());
            }
            if self.inner.resolved.wait_until(&mut state, deadline).timed_out() {
                return match &*state {
                    State::Resolved(stored) => Some((**stored).clone()),
                    State::Pending { .. } => None,
                };
            }
        }
    }

    /// The stored result, if any, without blocking.
    pub fn peek(&self) -> Option<IoResult<T>> {
        match &*self.inner.state.lock() {
            State::Resolved(stored) => Some((**stored).clone()),
            State::Pending { .. } => None,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Future for Promise<T> {
    type Output = IoResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.inner.state.lock();
        match &mut *state {
            State::Resolved(stored) => Poll::Ready((**stored).clone()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.state.lock() {
            State::Pending { actions, .. } => f
                .debug_struct("Promise")
                .field("pending_actions", &actions.len())
                .finish(),
            State::Resolved(stored) => f.debug_tuple("Promise").field(&**stored).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::task::Wake;
    use std::thread;

    #[test]
    fn test_promise_can_be_resolved() {
        let promise = Promise::<i32>::new();
        let seen = Arc::new(AtomicU32::new(0));

        assert!(promise.resolve(Ok(1)));
        let s = Arc::clone(&seen);
        promise.on_success(move |v| s.store(*v as u32, Ordering::SeqCst));

        assert_eq!(promise.join(), Ok(1));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_action_runs_after_resolution() {
        let promise = Promise::<i32>::new();
        let seen = Arc::new(AtomicU32::new(0));

        let s = Arc::clone(&seen);
        promise.on_success(move |v| s.store(*v as u32, Ordering::SeqCst));
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        promise.resolve(Ok(1));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_resolution_is_ignored() {
        let promise = Promise::<&'static str>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        promise.on_result(move |r| {
            assert_eq!(r, &Ok("first"));
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(promise.resolve(Ok("first")));
        assert!(!promise.resolve(Ok("second")));
        assert!(!promise.resolve(Err(Failure::Closed)));

        let c = Arc::clone(&calls);
        promise.on_result(move |r| {
            assert_eq!(r, &Ok("first"));
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(promise.peek(), Some(Ok("first")));
    }

    #[test]
    fn test_map_chain() {
        let promise = Promise::<i32>::new();
        let as_text = promise.map(|v| v.to_string());
        let parsed = as_text.map(|s| s.parse::<i64>().unwrap_or(-1));

        assert!(!parsed.is_resolved());
        promise.resolve(Ok(1));

        assert_eq!(as_text.join(), Ok("1".to_string()));
        assert_eq!(parsed.join(), Ok(1i64));
    }

    #[test]
    fn test_map_skips_failure() {
        let promise = Promise::<i32>::new();
        let mapped = promise.map(|_| -> i32 { panic!("mapper invoked on failure") });
        promise.resolve(Err(Failure::Closed));
        assert_eq!(mapped.join(), Err(Failure::Closed));
    }

    #[test]
    fn test_flat_map() {
        let first = Promise::<i32>::new();
        let second = Promise::<i32>::new();
        let s = second.clone();
        let chained = first.flat_map(move |v| s.map({
            let v = *v;
            move |w| v + w
        }));

        first.resolve(Ok(2));
        assert!(!chained.is_resolved());
        second.resolve(Ok(40));
        assert_eq!(chained.join(), Ok(42));
    }

    #[test]
    fn test_on_failure_only_sees_failures() {
        let promise = Promise::<i32>::failure(Failure::Closed);
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        promise.on_success(move |_| {
            h.fetch_add(100, Ordering::SeqCst);
        });
        let h = Arc::clone(&hits);
        promise.on_failure(move |cause| {
            assert_eq!(cause, &Failure::Closed);
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_join_across_threads() {
        let promise = Promise::<u64>::new();
        let producer = promise.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.resolve(Ok(7));
        });

        assert_eq!(promise.join(), Ok(7));
        handle.join().unwrap();
    }

    #[test]
    fn test_join_timeout_expires() {
        let promise = Promise::<u64>::new();
        assert_eq!(promise.join_timeout(Duration::from_millis(5)), None);
        promise.resolve(Ok(3));
        assert_eq!(promise.join_timeout(Duration::from_millis(5)), Some(Ok(3)));
    }

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_future_wakes_on_resolve() {
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(Arc::clone(&counter));
        let mut cx = Context::from_waker(&waker);

        let mut promise = Promise::<u8>::new();
        assert!(Pin::new(&mut promise).poll(&mut cx).is_pending());
        // Re-polling with the same waker does not register it twice.
        assert!(Pin::new(&mut promise).poll(&mut cx).is_pending());

        promise.resolve(Ok(9));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(Pin::new(&mut promise).poll(&mut cx), Poll::Ready(Ok(9)));
    }
}
