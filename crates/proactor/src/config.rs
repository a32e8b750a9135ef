//! Proactor configuration.
//!
//! Library defaults, overridable from the environment and then from code:
//!
//! ```ignore
//! use proactor::config::ProactorConfig;
//!
//! let config = ProactorConfig::from_env()
//!     .sq_entries(512)
//!     .pool_ceiling(Some(4096));
//! ```
//!
//! | Variable                      | Field              | Default |
//! |-------------------------------|--------------------|---------|
//! | `PROACTOR_SQ_ENTRIES`         | `sq_entries`       | 256     |
//! | `PROACTOR_CQ_ENTRIES`         | `cq_entries`       | 2 × SQ  |
//! | `PROACTOR_INBOX_CAPACITY`     | `inbox_capacity`   | 4096    |
//! | `PROACTOR_POOL_CEILING`       | `pool_ceiling`     | none    |
//! | `PROACTOR_COMPLETION_BATCH`   | `completion_batch` | 256     |
//! | `PROACTOR_WAIT_TIMEOUT_MS`    | `wait_timeout`     | 100ms   |
//! | `PROACTOR_SHUTDOWN_DRAIN_MS`  | `shutdown_drain`   | 1000ms  |

use std::str::FromStr;

use proactor_core::timeout::Timeout;
use proactor_module::UringBackendConfig;

/// Get environment variable parsed as type T, or return default.
///
/// Unset and unparsable values both fall back to the default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as optional value.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean.
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProactorConfig {
    /// Submission queue size (power of 2).
    pub sq_entries: u32,
    /// Completion queue size. `None` lets the kernel pick 2 × SQ.
    pub cq_entries: Option<u32>,
    /// Capacity of the cross-thread request queue.
    pub inbox_capacity: usize,
    /// Per-kind pool growth ceiling. `None` means unbounded.
    pub pool_ceiling: Option<usize>,
    /// Completions reserved per cycle; also the inbox requests admitted per cycle.
    pub completion_batch: usize,
    /// Kernel wait bound used by the reactor thread.
    pub wait_timeout: Timeout,
    /// How long shutdown waits for in-flight operations.
    pub shutdown_drain: Timeout,
    /// Keep an eventfd poll armed so other threads can wake the reactor.
    pub wake_poll: bool,
}

impl Default for ProactorConfig {
    fn default() -> Self {
        Self {
            sq_entries: 256,
            cq_entries: None,
            inbox_capacity: 4096,
            pool_ceiling: None,
            completion_batch: 256,
            wait_timeout: Timeout::from_millis(100),
            shutdown_drain: Timeout::from_secs(1),
            wake_poll: true,
        }
    }
}

impl ProactorConfig {
    /// Defaults with `PROACTOR_*` environment overrides applied.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            sq_entries: env_get("PROACTOR_SQ_ENTRIES", d.sq_entries),
            cq_entries: env_get_opt("PROACTOR_CQ_ENTRIES").or(d.cq_entries),
            inbox_capacity: env_get("PROACTOR_INBOX_CAPACITY", d.inbox_capacity),
            pool_ceiling: env_get_opt("PROACTOR_POOL_CEILING").or(d.pool_ceiling),
            completion_batch: env_get("PROACTOR_COMPLETION_BATCH", d.completion_batch),
            wait_timeout: env_get_opt("PROACTOR_WAIT_TIMEOUT_MS")
                .map_or(d.wait_timeout, Timeout::from_millis),
            shutdown_drain: env_get_opt("PROACTOR_SHUTDOWN_DRAIN_MS")
                .map_or(d.shutdown_drain, Timeout::from_millis),
            wake_poll: env_get_bool("PROACTOR_WAKE_POLL", d.wake_poll),
        }
    }

    pub fn sq_entries(mut self, entries: u32) -> Self {
        self.sq_entries = entries;
        self
    }

    pub fn cq_entries(mut self, entries: Option<u32>) -> Self {
        self.cq_entries = entries;
        self
    }

    pub fn inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }

    pub fn pool_ceiling(mut self, ceiling: Option<usize>) -> Self {
        self.pool_ceiling = ceiling;
        self
    }

    pub fn completion_batch(mut self, batch: usize) -> Self {
        self.completion_batch = batch;
        self
    }

    pub fn wait_timeout(mut self, timeout: Timeout) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn shutdown_drain(mut self, timeout: Timeout) -> Self {
        self.shutdown_drain = timeout;
        self
    }

    pub fn wake_poll(mut self, enabled: bool) -> Self {
        self.wake_poll = enabled;
        self
    }

    pub fn backend(&self) -> UringBackendConfig {
        UringBackendConfig {
            sq_entries: self.sq_entries,
            cq_entries: self.cq_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__PROACTOR_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        let val: Option<u32> = env_get_opt("__PROACTOR_TEST_UNSET__");
        assert!(val.is_none());
        assert!(env_get_bool("__PROACTOR_TEST_UNSET__", true));
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__PROACTOR_TEST_NUM__", " 123 ");
        let val: usize = env_get("__PROACTOR_TEST_NUM__", 0);
        assert_eq!(val, 123);

        std::env::set_var("__PROACTOR_TEST_NUM__", "nope");
        let val: usize = env_get("__PROACTOR_TEST_NUM__", 9);
        assert_eq!(val, 9);
        std::env::remove_var("__PROACTOR_TEST_NUM__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for yes in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var("__PROACTOR_TEST_BOOL__", yes);
            assert!(env_get_bool("__PROACTOR_TEST_BOOL__", false), "{}", yes);
        }
        for no in ["0", "false", "garbage"] {
            std::env::set_var("__PROACTOR_TEST_BOOL__", no);
            assert!(!env_get_bool("__PROACTOR_TEST_BOOL__", true), "{}", no);
        }
        std::env::remove_var("__PROACTOR_TEST_BOOL__");
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("PROACTOR_SQ_ENTRIES", "64");
        std::env::set_var("PROACTOR_POOL_CEILING", "10");
        std::env::set_var("PROACTOR_WAIT_TIMEOUT_MS", "5");
        let config = ProactorConfig::from_env();
        std::env::remove_var("PROACTOR_SQ_ENTRIES");
        std::env::remove_var("PROACTOR_POOL_CEILING");
        std::env::remove_var("PROACTOR_WAIT_TIMEOUT_MS");

        assert_eq!(config.sq_entries, 64);
        assert_eq!(config.pool_ceiling, Some(10));
        assert_eq!(config.wait_timeout, Timeout::from_millis(5));
        assert_eq!(config.inbox_capacity, 4096);
    }

    #[test]
    fn test_builder() {
        let config = ProactorConfig::default()
            .sq_entries(32)
            .cq_entries(Some(128))
            .wake_poll(false);
        let backend = config.backend();
        assert_eq!(backend.sq_entries, 32);
        assert_eq!(backend.cq_entries, Some(128));
        assert!(!config.wake_poll);
    }
}
