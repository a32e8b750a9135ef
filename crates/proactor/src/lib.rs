//! # proactor: Completion-based I/O exchange over io_uring
//!
//! Callers request an operation (read, accept, stat, ...) with a
//! continuation; the proactor batches the submissions into the kernel ring
//! and hands each completion back to its continuation on the reactor thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Caller                                          │
//! │   proactor.read(fd, buf, off, timeout, |res, p| ...)    │
//! │   handle.accept(sock, flags, None).join()  ← any thread │
//! └──────────────────┬──────────────────────────────────────┘
//!                    │ request()
//!                    ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │         Exchange layer                                   │
//! │   ExchangeEntryFactory → pooled ExchangeEntry<K>        │
//! │   CompletionRegistry: tag ↔ (kind, slot)                │
//! │   optional linked TimeoutGuard (IO_LINK + LinkTimeout)  │
//! └──────────────────┬──────────────────────────────────────┘
//!                    │ staged SubmitRecords, one push per cycle
//! ┌──────────────────▼──────────────────────────────────────┐
//! │         RingBackend (UringBackend)                       │
//! │   submit_and_wait → CompletionRecords → dispatch        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use proactor::{ProactorConfig, Reactor};
//! use proactor_core::Timeout;
//!
//! let mut reactor = Reactor::start(ProactorConfig::from_env())?;
//! let handle = reactor.handle();
//!
//! let slept = handle.delay(Timeout::from_millis(50)).join()?;
//! println!("slept {:?}", slept);
//!
//! reactor.shutdown().join()?;
//! ```
//!
//! ## Design Decisions
//!
//! - **Pooled entries**: one LIFO pool per kind; steady state allocates nothing
//! - **Dense tags**: lowest free tag first, so `user_data` stays small
//! - **Continuations run on the reactor thread** and may issue new requests
//! - **Closed is final**: after shutdown every request fails with `Failure::Closed`

pub mod config;
pub mod exchange;
pub mod factory;
pub mod pool;
pub mod proactor;
pub mod reactor;
pub mod registry;

pub use config::ProactorConfig;
pub use exchange::{
    Continuation, EntryState, Expiry, ExchangeEntry, ExchangeKind, ListenParams, OpKind,
    OpenParams, SocketParams, StatParams, StatTarget,
};
pub use factory::ExchangeEntryFactory;
pub use pool::{ObjectPool, PoolStats};
pub use proactor::{Proactor, ProactorStats};
pub use reactor::{resolver, ProactorHandle, Reactor};
pub use registry::{CompletionRegistry, EntryRef};
