//! # threadstream - Shared-memory text streams
//!
//! Hands a continuous text stream to a dedicated writer thread without
//! blocking the producer and without allocating a message per write.
//!
//! ## Features
//!
//! - **Zero-copy hand-off**: one shared mapping, two atomic cursors
//! - **UTF-8 safe**: chunks never split a multi-byte character
//! - **Backpressure**: `write` returns `false` and a `Drain` event follows
//! - **Sync or async producers**: futex waits or a cooperative `Flush` future
//! - **Side channel**: application messages in both directions
//!
//! ## Quick Start
//!
//! ```ignore
//! use threadstream::{to_file, StreamConfig};
//!
//! fn main() -> threadstream::StreamResult<()> {
//!     let mut stream = to_file("out.log", StreamConfig::new())?;
//!     stream.write("hello\n")?;
//!     stream.write("world\n")?;
//!     stream.end()?;
//!     stream.wait_closed()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Producer                               │
//! │        write(), flush(), end(), on(EventKind, ..)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ThreadStream                             │
//! │     pending text, chunking, drain/rewind, event dispatch    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Control  │      │   Data    │      │ Mailboxes │
//!    │   Block   │      │   Area    │      │ (both way)│
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                  Worker Thread                          │
//!    │       Pump: decode chunk, Destination::write, ack       │
//!    └─────────────────────────────────────────────────────────┘
//! ```

use std::io;
use std::path::Path;

// Re-export core types
pub use threadstream_core::{
    ControllerState,
    Cursor,
    MisuseError,
    ProtocolError,
    PumpState,
    StreamError,
    StreamResult,
    WorkerError,
};

// Re-export kprint macros for debug logging
pub use threadstream_core::{kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use threadstream_core::kprint::{
    LogLevel, init as init_logging, set_log_level, set_flush_enabled, set_thread_tag_enabled,
};

// Re-export env utilities
pub use threadstream_core::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

// Re-export runtime types
pub use threadstream_runtime::{
    ContextHandle,
    Destination,
    DestinationFactory,
    EventKind,
    FileDestination,
    Flush,
    SideMessage,
    StreamConfig,
    StreamEvent,
    ThreadStream,
    WaitPolicy,
    WorkerContext,
    WriteMode,
};

/// Stream text into a file, truncating it first.
///
/// The file is created on the worker thread; a failure to open it is
/// reported through `wait_ready` and the `Error` event.
pub fn to_file(path: impl AsRef<Path>, config: StreamConfig) -> StreamResult<ThreadStream> {
    let path = path.as_ref().to_path_buf();
    ThreadStream::new(config, move |_: &WorkerContext| -> io::Result<Box<dyn Destination>> {
        Ok(Box::new(FileDestination::create(&path)?))
    })
}

/// Stream text onto the end of a file, creating it if needed
pub fn append_to_file(path: impl AsRef<Path>, config: StreamConfig) -> StreamResult<ThreadStream> {
    let path = path.as_ref().to_path_buf();
    ThreadStream::new(config, move |_: &WorkerContext| -> io::Result<Box<dyn Destination>> {
        Ok(Box::new(FileDestination::append(&path)?))
    })
}

/// Get the library version
pub fn version() -> &'static str {
    threadstream_core::VERSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::fs;
    use std::time::Duration;

    fn config(mode: WriteMode) -> StreamConfig {
        StreamConfig::new()
            .capacity(64)
            .mode(mode)
            .flush_policy(Duration::from_millis(100), 50)
            .end_policy(Duration::from_millis(100), 50)
            .poll_interval(Duration::from_millis(100))
    }

    #[test]
    fn test_to_file_sync() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.log");

        let mut stream = to_file(&path, config(WriteMode::Sync)).unwrap();
        for i in 0..100 {
            stream.write(&format!("line {}\n", i)).unwrap();
        }
        stream.end().unwrap();
        stream.wait_closed().unwrap();

        let expected: String = (0..100).map(|i| format!("line {}\n", i)).collect();
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn test_to_file_async_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("async.log");

        let mut stream = to_file(&path, config(WriteMode::Async)).unwrap();
        for _ in 0..50 {
            if !stream.write("héllo wörld\n").unwrap() {
                block_on(stream.flush()).unwrap();
            }
        }
        block_on(stream.flush()).unwrap();
        stream.end().unwrap();
        stream.wait_closed().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "héllo wörld\n".repeat(50));
    }

    #[test]
    fn test_small_buffer_with_idle_poll_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refills.log");
        let line = "0123456789abcde\n";

        let started = std::time::Instant::now();
        let mut stream = to_file(
            &path,
            config(WriteMode::Sync)
                .capacity(16)
                .poll_interval(Duration::from_secs(60)),
        )
        .unwrap();
        for _ in 0..500 {
            stream.write(line).unwrap();
        }
        stream.end().unwrap();
        stream.wait_closed().unwrap();

        assert!(started.elapsed() < Duration::from_secs(20), "{:?}", started.elapsed());
        assert_eq!(fs::read_to_string(&path).unwrap(), line.repeat(500));
    }

    #[test]
    fn test_append_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("append.log");
        fs::write(&path, "first\n").unwrap();

        let mut stream = append_to_file(&path, config(WriteMode::Sync)).unwrap();
        stream.write("second\n").unwrap();
        stream.end().unwrap();
        stream.wait_closed().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_unopenable_file_fails_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.log");

        let mut stream = to_file(&path, config(WriteMode::Sync)).unwrap();
        let err = stream.wait_ready().unwrap_err();
        assert!(
            matches!(err.root(), StreamError::Worker(WorkerError::Destination(_))),
            "{err}"
        );
        assert!(stream.is_destroyed());
    }
}
