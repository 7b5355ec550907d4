//! # threadstream-runtime
//!
//! Platform-specific runtime for threadstream.
//!
//! This crate provides:
//! - Shared mapping holding the control block and data area (mmap)
//! - Blocking waits on the cursor cells (futex on Linux, condvar elsewhere)
//! - Cooperative waits for async producers, backed by a timer thread
//! - The worker thread and its pump loop
//! - The producer-side stream controller

pub mod config;
pub mod wait;
pub mod timer;
pub mod memory;
pub mod shared;
pub mod buffer;
pub mod message;
pub mod destination;
pub mod worker;
pub mod pump;
pub mod controller;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{StreamConfig, WaitPolicy, WriteMode};
pub use controller::{EventKind, Flush, StreamEvent, ThreadStream};
pub use destination::{Destination, DestinationFactory, FileDestination};
pub use message::SideMessage;
pub use worker::{ContextHandle, WorkerContext};
pub use wait::{notify, wait_until_different, wait_until_equal, WaitOutcome};
