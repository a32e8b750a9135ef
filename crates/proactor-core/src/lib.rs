//! # proactor-core: Leaf types and trait seams for the proactor
//!
//! Everything the exchange layer shares with its backends lives here:
//! native handle wrappers, flag sets, the timeout value, the failure
//! taxonomy, the single-resolution [`promise::Promise`], and the two trait
//! boundaries the proactor is built against.
//!
//! ## Seams
//!
//! | Trait         | Default impl (proactor-module) | Purpose                      |
//! |---------------|--------------------------------|------------------------------|
//! | `RingBackend` | `UringBackend`                 | submission/completion rings  |
//! | `Notifier`    | `EventFdNotifier`              | wake the reactor thread      |
//!
//! The proactor holds both as trait objects, so tests substitute scripted
//! implementations without touching the kernel.

pub mod handle;
pub mod flags;
pub mod timeout;
pub mod error;
pub mod promise;
pub mod submission;
pub mod backend;
pub mod notifier;
pub mod stat;

pub use error::{Failure, IoResult, NativeError, Resource, RingError};
pub use handle::{
    AddressFamily, BufferSpan, ConnectionContext, FileDescriptor, IoVectorSpan, ListenContext,
    OffsetT, SizeT, SocketType, SpliceDescriptor,
};
pub use promise::Promise;
pub use stat::{FileStat, FileType, StatTime};
pub use timeout::Timeout;
