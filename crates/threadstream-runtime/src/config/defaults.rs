//! Library defaults, overridable through `StreamConfig::from_env()`

/// Channel buffer capacity in bytes (4 MiB)
pub const CAPACITY: usize = 4 * 1024 * 1024;

/// Producer writes block until transferred
pub const SYNC: bool = true;

/// One flush_sync wait interval
pub const FLUSH_INTERVAL_MS: u64 = 1000;

/// Timeouts tolerated before flush_sync reports a deadlock
pub const FLUSH_RETRIES: u32 = 10;

/// One end() acknowledgement wait interval
pub const END_INTERVAL_MS: u64 = 1000;

/// Timeouts tolerated before end() gives up on the acknowledgement
pub const END_RETRIES: u32 = 10;

/// Liveness re-check for cooperative waits and the pump's idle wait
pub const POLL_INTERVAL_MS: u64 = 10_000;

/// Pending text ceiling before writes are forced through synchronously
pub const MAX_PENDING_LEN: usize = 512 * 1024 * 1024;
