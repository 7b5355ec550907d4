//! Destination sinks
//!
//! The worker forwards every decoded chunk to a `Destination`. The
//! destination is built on the worker thread by a `DestinationFactory`, so
//! it never has to cross threads after construction.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::worker::WorkerContext;

/// Sink for the text stream.
pub trait Destination: Send {
    /// Accept one chunk. `Ok(false)` asks the pump to call `wait_drain`
    /// before it releases the chunk's space in the channel buffer.
    fn write(&mut self, chunk: &str) -> io::Result<bool>;

    /// Block until the destination can take more input
    fn wait_drain(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Finish and close. Called once, after the last chunk.
    fn end(&mut self) -> io::Result<()>;
}

/// Builds the destination on the worker thread
pub trait DestinationFactory: Send + 'static {
    fn create(self: Box<Self>, ctx: &WorkerContext) -> io::Result<Box<dyn Destination>>;
}

impl<F> DestinationFactory for F
where
    F: FnOnce(&WorkerContext) -> io::Result<Box<dyn Destination>> + Send + 'static,
{
    fn create(self: Box<Self>, ctx: &WorkerContext) -> io::Result<Box<dyn Destination>> {
        (*self)(ctx)
    }
}

/// Default buffered bytes above which `FileDestination` reports backpressure
pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

/// Buffered file sink
pub struct FileDestination {
    writer: BufWriter<File>,
    high_water_mark: usize,
    path: PathBuf,
}

impl FileDestination {
    /// Create or truncate `path`
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::from_file(file, path.as_ref()))
    }

    /// Open `path` for appending, creating it if needed
    pub fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::from_file(file, path.as_ref()))
    }

    fn from_file(file: File, path: &Path) -> Self {
        Self {
            writer: BufWriter::with_capacity(DEFAULT_HIGH_WATER_MARK * 2, file),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            path: path.to_path_buf(),
        }
    }

    /// Set the backpressure threshold
    pub fn with_high_water_mark(mut self, bytes: usize) -> Self {
        self.high_water_mark = bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Destination for FileDestination {
    fn write(&mut self, chunk: &str) -> io::Result<bool> {
        self.writer.write_all(chunk.as_bytes())?;
        Ok(self.writer.buffer().len() < self.high_water_mark)
    }

    fn wait_drain(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn end(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}
