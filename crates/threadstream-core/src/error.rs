//! Error types for threadstream

use core::fmt;
use std::time::Duration;

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur in stream operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Cursors observed in an impossible state
    Protocol(ProtocolError),

    /// A bounded wait on the peer ran out of retries
    TookTooLong {
        /// Operation that was waiting (`"flush_sync"`, `"end"`, ...)
        operation: &'static str,
        /// Total time spent waiting
        waited: Duration,
    },

    /// Worker thread or destination fault
    Worker(WorkerError),

    /// API called in a state that does not allow it
    Misuse(MisuseError),

    /// Stream was destroyed earlier; carries the original cause
    Destroyed {
        cause: Box<StreamError>,
    },

    /// Configuration rejected by `StreamConfig::validate`
    InvalidConfig(&'static str),

    /// Shared memory could not be mapped (errno)
    MapFailed(i32),
}

impl StreamError {
    /// Wrap this error as the cause of a destroyed stream
    pub fn destroyed(cause: StreamError) -> Self {
        match cause {
            // Never nest destroyed-in-destroyed
            StreamError::Destroyed { .. } => cause,
            other => StreamError::Destroyed { cause: Box::new(other) },
        }
    }

    /// Root cause, looking through `Destroyed`
    pub fn root(&self) -> &StreamError {
        match self {
            StreamError::Destroyed { cause } => cause.root(),
            other => other,
        }
    }

    /// Whether this error means the channel can never be used again
    #[inline]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StreamError::Misuse(_) | StreamError::InvalidConfig(_))
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Protocol(e) => write!(f, "protocol violation: {}", e),
            StreamError::TookTooLong { operation, waited } => {
                write!(f, "{}() took too long ({}ms)", operation, waited.as_millis())
            }
            StreamError::Worker(e) => write!(f, "worker error: {}", e),
            StreamError::Misuse(e) => write!(f, "{}", e),
            StreamError::Destroyed { cause } => write!(f, "stream destroyed: {}", cause),
            StreamError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            StreamError::MapFailed(errno) => write!(f, "shared memory mapping failed: errno {}", errno),
        }
    }
}

impl std::error::Error for StreamError {}

/// Shared cursor protocol violations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Producer saw `read > write` or `write > capacity`
    Overwritten {
        read: i32,
        write: i32,
    },

    /// Negative cursor value that is not a known sentinel
    InvalidCursor(i32),

    /// Consumer found bytes that do not decode as UTF-8
    InvalidUtf8 {
        offset: u32,
    },

    /// Consumer stored the fault sentinel
    ConsumerFault,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Overwritten { read, write } => {
                write!(f, "overwritten (read index {} write index {})", read, write)
            }
            ProtocolError::InvalidCursor(raw) => write!(f, "invalid cursor value {}", raw),
            ProtocolError::InvalidUtf8 { offset } => {
                write!(f, "invalid utf-8 in channel buffer at offset {}", offset)
            }
            ProtocolError::ConsumerFault => write!(f, "consumer reported a fault"),
        }
    }
}

impl From<ProtocolError> for StreamError {
    fn from(e: ProtocolError) -> Self {
        StreamError::Protocol(e)
    }
}

/// Worker thread and destination faults
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Failed to spawn the worker thread
    SpawnFailed(String),

    /// Destination factory or destination I/O failed
    Destination(String),

    /// Worker exited with a non-zero status
    Exited {
        status: i32,
    },

    /// Worker exited cleanly before the end-of-stream handshake
    ExitedBeforeEnd,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::SpawnFailed(msg) => write!(f, "failed to spawn worker thread: {}", msg),
            WorkerError::Destination(msg) => write!(f, "destination failed: {}", msg),
            WorkerError::Exited { status } => write!(f, "worker exited with status {}", status),
            WorkerError::ExitedBeforeEnd => {
                write!(f, "worker exited before the destination stream was drained")
            }
        }
    }
}

impl From<WorkerError> for StreamError {
    fn from(e: WorkerError) -> Self {
        StreamError::Worker(e)
    }
}

/// Programming errors, raised synchronously to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisuseError {
    /// `flush_sync()` while an asynchronous drain cycle owns the buffer
    FlushInProgress,

    /// `write()` after `end()`
    WriteAfterEnd,
}

impl fmt::Display for MisuseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MisuseError::FlushInProgress => {
                write!(f, "unable to flush while flushing asynchronously")
            }
            MisuseError::WriteAfterEnd => write!(f, "write after end"),
        }
    }
}

impl From<MisuseError> for StreamError {
    fn from(e: MisuseError) -> Self {
        StreamError::Misuse(e)
    }
}
