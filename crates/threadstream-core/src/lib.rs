//! # threadstream-core
//!
//! Core types for threadstream, the shared-memory text channel between a
//! producer and its dedicated writer thread.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Memory mapping, blocking waits and the worker thread live in
//! `threadstream-runtime`.
//!
//! ## Modules
//!
//! - `control` - Shared control block layout (the two cursors)
//! - `cursor` - Cursor values and their sentinels
//! - `chunk` - Character-boundary-safe chunking rule
//! - `state` - Controller and pump state enums
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod control;
pub mod cursor;
pub mod chunk;
pub mod state;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use control::{ControlBlock, CursorSlot, CONTROL_BLOCK_SIZE};
pub use cursor::{Cursor, CONSUMER_FAULT, END_OF_STREAM};
pub use chunk::fit_prefix;
pub use state::{ControllerState, PumpState};
pub use error::{MisuseError, ProtocolError, StreamError, StreamResult, WorkerError};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

/// Crate version, reported to destinations through the worker context
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Constants for the shared layout
pub mod constants {
    /// Smallest usable channel capacity: one maximal UTF-8 character
    pub const MIN_CAPACITY: usize = 4;

    /// Largest channel capacity addressable by an `i32` cursor
    pub const MAX_CAPACITY: usize = i32::MAX as usize;

    /// Longest UTF-8 encoding of a single character
    pub const MAX_CHAR_LEN: usize = 4;

    /// Cache line size for alignment
    pub const CACHE_LINE_SIZE: usize = 64;

    /// Default worker thread name
    pub const DEFAULT_WORKER_NAME: &str = "thread-stream";
}
