//! Native memory with stable addresses.
//!
//! Every structure the kernel reads or writes asynchronously lives in one
//! of these wrappers. Each owns exactly one allocation, exposes its address
//! as a `u64` for a `SubmitRecord`, and frees the allocation on drop. The
//! address never changes while the wrapper is alive, even when the wrapper
//! itself moves.

mod buffer;
mod timespec;
mod address;
mod iovec;
mod cstring;
mod statx;

pub use address::OffHeapSocketAddress;
pub use buffer::OffHeapBuffer;
pub use cstring::OffHeapCString;
pub use iovec::OffHeapIoVector;
pub use statx::OffHeapStat;
pub use timespec::OffHeapTimeSpec;
