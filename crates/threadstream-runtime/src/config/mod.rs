//! Stream configuration
//!
//! Provides library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env()` only)
//! 3. Library defaults (`defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use threadstream_runtime::config::{StreamConfig, WriteMode};
//!
//! let config = StreamConfig::from_env()
//!     .capacity(64 * 1024)
//!     .mode(WriteMode::Async)
//!     .worker_name("audit-log");
//! ```

pub mod defaults;

use std::time::Duration;
use threadstream_core::constants::{DEFAULT_WORKER_NAME, MAX_CAPACITY, MIN_CAPACITY};
use threadstream_core::env::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str};
use threadstream_core::error::{StreamError, StreamResult};

/// How `write()` moves data into the channel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drain pending data before `write()` returns, blocking on a full buffer
    Sync,
    /// Copy what fits without blocking, continue from `poll_events()` / `flush()`
    Async,
}

/// Bounded blocking wait: `retries` timeouts of `interval` each.
///
/// Turns an unresponsive peer into a `TookTooLong` error instead of a hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub retries: u32,
}

impl WaitPolicy {
    pub const fn new(interval: Duration, retries: u32) -> Self {
        Self { interval, retries }
    }

    /// Upper bound of time spent waiting under this policy
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.retries)
    }
}

/// Stream configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Channel buffer capacity in bytes
    pub capacity: usize,
    /// Sync or async producer write path
    pub mode: WriteMode,
    /// flush_sync() and full-buffer waits
    pub flush_policy: WaitPolicy,
    /// end() acknowledgement wait
    pub end_policy: WaitPolicy,
    /// Liveness re-check interval for otherwise unbounded waits
    pub poll_interval: Duration,
    /// Pending length that forces an oversized write through in pieces
    pub max_pending_len: usize,
    /// Worker thread name
    pub worker_name: String,
    /// Worker thread stack size (None = system default)
    pub worker_stack_size: Option<usize>,
    /// Opaque data handed to the destination factory
    pub worker_data: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConfig {
    /// Create config with library defaults (no env override).
    pub fn new() -> Self {
        Self {
            capacity: defaults::CAPACITY,
            mode: if defaults::SYNC { WriteMode::Sync } else { WriteMode::Async },
            flush_policy: WaitPolicy::new(
                Duration::from_millis(defaults::FLUSH_INTERVAL_MS),
                defaults::FLUSH_RETRIES,
            ),
            end_policy: WaitPolicy::new(
                Duration::from_millis(defaults::END_INTERVAL_MS),
                defaults::END_RETRIES,
            ),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            max_pending_len: defaults::MAX_PENDING_LEN,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            worker_stack_size: None,
            worker_data: String::new(),
        }
    }

    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `TS_BUFFER_SIZE` - Channel capacity, e.g. `65536`, `512K`, `4M`
    /// - `TS_SYNC` - Synchronous writes (0/1)
    /// - `TS_FLUSH_INTERVAL_MS` / `TS_FLUSH_RETRIES` - flush_sync wait policy
    /// - `TS_END_INTERVAL_MS` / `TS_END_RETRIES` - end() wait policy
    /// - `TS_POLL_INTERVAL_MS` - Liveness re-check interval
    /// - `TS_MAX_PENDING` - Pending text ceiling
    /// - `TS_WORKER_NAME` - Worker thread name
    /// - `TS_WORKER_STACK_SIZE` - Worker thread stack size
    pub fn from_env() -> Self {
        Self {
            capacity: env_get_size("TS_BUFFER_SIZE", defaults::CAPACITY),
            mode: if env_get_bool("TS_SYNC", defaults::SYNC) {
                WriteMode::Sync
            } else {
                WriteMode::Async
            },
            flush_policy: WaitPolicy::new(
                Duration::from_millis(env_get("TS_FLUSH_INTERVAL_MS", defaults::FLUSH_INTERVAL_MS)),
                env_get("TS_FLUSH_RETRIES", defaults::FLUSH_RETRIES),
            ),
            end_policy: WaitPolicy::new(
                Duration::from_millis(env_get("TS_END_INTERVAL_MS", defaults::END_INTERVAL_MS)),
                env_get("TS_END_RETRIES", defaults::END_RETRIES),
            ),
            poll_interval: Duration::from_millis(env_get(
                "TS_POLL_INTERVAL_MS",
                defaults::POLL_INTERVAL_MS,
            )),
            max_pending_len: env_get_size("TS_MAX_PENDING", defaults::MAX_PENDING_LEN),
            worker_name: env_get_str("TS_WORKER_NAME", DEFAULT_WORKER_NAME),
            worker_stack_size: env_get_opt::<String>("TS_WORKER_STACK_SIZE")
                .and_then(|s| threadstream_core::env::parse_size(&s)),
            worker_data: String::new(),
        }
    }

    /// Set channel capacity in bytes
    pub fn capacity(mut self, bytes: usize) -> Self {
        self.capacity = bytes;
        self
    }

    /// Set write mode
    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(Sync)` / `mode(Async)`
    pub fn sync(self, sync: bool) -> Self {
        self.mode(if sync { WriteMode::Sync } else { WriteMode::Async })
    }

    /// Set flush_sync wait policy
    pub fn flush_policy(mut self, interval: Duration, retries: u32) -> Self {
        self.flush_policy = WaitPolicy::new(interval, retries);
        self
    }

    /// Set end() acknowledgement wait policy
    pub fn end_policy(mut self, interval: Duration, retries: u32) -> Self {
        self.end_policy = WaitPolicy::new(interval, retries);
        self
    }

    /// Set liveness re-check interval
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    /// Set pending text ceiling
    pub fn max_pending_len(mut self, bytes: usize) -> Self {
        self.max_pending_len = bytes;
        self
    }

    /// Set worker thread name
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Set worker thread stack size
    pub fn worker_stack_size(mut self, bytes: usize) -> Self {
        self.worker_stack_size = Some(bytes);
        self
    }

    /// Set opaque data for the destination factory
    pub fn worker_data(mut self, data: impl Into<String>) -> Self {
        self.worker_data = data.into();
        self
    }

    #[inline]
    pub fn is_sync(&self) -> bool {
        self.mode == WriteMode::Sync
    }

    /// Validate configuration
    pub fn validate(&self) -> StreamResult<()> {
        if self.capacity < MIN_CAPACITY {
            return Err(StreamError::InvalidConfig("capacity must be at least 4 bytes"));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(StreamError::InvalidConfig("capacity exceeds i32::MAX"));
        }
        for policy in [&self.flush_policy, &self.end_policy] {
            if policy.retries == 0 {
                return Err(StreamError::InvalidConfig("wait policy retries must be at least 1"));
            }
            if policy.interval.is_zero() {
                return Err(StreamError::InvalidConfig("wait policy interval must be non-zero"));
            }
        }
        if self.poll_interval.is_zero() {
            return Err(StreamError::InvalidConfig("poll_interval must be non-zero"));
        }
        if self.max_pending_len < MIN_CAPACITY {
            return Err(StreamError::InvalidConfig("max_pending_len must be at least 4 bytes"));
        }
        if self.worker_name.is_empty() {
            return Err(StreamError::InvalidConfig("worker_name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::new();
        assert_eq!(config.capacity, 4 * 1024 * 1024);
        assert_eq!(config.mode, WriteMode::Sync);
        assert_eq!(config.flush_policy.budget(), Duration::from_secs(10));
        assert_eq!(config.end_policy.retries, 10);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.worker_name, "thread-stream");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = StreamConfig::new()
            .capacity(15)
            .sync(false)
            .flush_policy(Duration::from_millis(10), 3)
            .worker_name("audit")
            .worker_data("{\"dest\":\"/tmp/x\"}");
        assert_eq!(config.capacity, 15);
        assert!(!config.is_sync());
        assert_eq!(config.flush_policy.budget(), Duration::from_millis(30));
        assert_eq!(config.worker_name, "audit");
        assert_eq!(config.worker_data, "{\"dest\":\"/tmp/x\"}");
    }

    #[test]
    fn test_validate() {
        assert!(StreamConfig::new().capacity(4).validate().is_ok());
        assert_eq!(
            StreamConfig::new().capacity(3).validate(),
            Err(StreamError::InvalidConfig("capacity must be at least 4 bytes"))
        );
        assert!(StreamConfig::new()
            .end_policy(Duration::from_millis(1), 0)
            .validate()
            .is_err());
        assert!(StreamConfig::new()
            .flush_policy(Duration::ZERO, 1)
            .validate()
            .is_err());
        assert!(StreamConfig::new().worker_name("").validate().is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        // Variable names are unique to this test
        std::env::set_var("TS_WORKER_NAME", "env-worker");
        std::env::set_var("TS_WORKER_STACK_SIZE", "256K");
        let config = StreamConfig::from_env();
        assert_eq!(config.worker_name, "env-worker");
        assert_eq!(config.worker_stack_size, Some(256 * 1024));
        std::env::remove_var("TS_WORKER_NAME");
        std::env::remove_var("TS_WORKER_STACK_SIZE");
    }
}
