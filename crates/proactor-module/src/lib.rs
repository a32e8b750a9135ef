//! # proactor-module: Default implementations
//!
//! The concrete pieces the proactor runs on by default.
//!
//! | Trait / concern | Default impl       | Notes                              |
//! |-----------------|--------------------|------------------------------------|
//! | RingBackend     | `UringBackend`     | SQPOLL behind the `sqpoll` feature |
//! | Notifier        | `EventFdNotifier`  | polled on the proactor's own ring  |
//! | native memory   | `offheap::*`       | stable addresses handed to the kernel |

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod uring_backend;
        pub mod eventfd_notifier;
        pub mod offheap;

        pub use eventfd_notifier::EventFdNotifier;
        pub use uring_backend::{UringBackend, UringBackendConfig};
    } else {
        compile_error!("proactor-module requires Linux io_uring");
    }
}
