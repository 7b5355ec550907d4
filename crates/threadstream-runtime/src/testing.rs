//! Test destinations

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::destination::Destination;

#[derive(Debug, Default)]
struct CollectedInner {
    text: String,
    chunks: Vec<String>,
    drains: usize,
    ended: bool,
}

/// What a `CollectDestination` received, readable from the test thread
#[derive(Debug, Clone, Default)]
pub struct Collected(Arc<Mutex<CollectedInner>>);

impl Collected {
    fn lock(&self) -> MutexGuard<'_, CollectedInner> {
        self.0.lock().unwrap()
    }

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn chunks(&self) -> Vec<String> {
        self.lock().chunks.clone()
    }

    pub fn drains(&self) -> usize {
        self.lock().drains
    }

    pub fn ended(&self) -> bool {
        self.lock().ended
    }
}

/// In-memory destination
pub struct CollectDestination {
    collected: Collected,
    /// Report backpressure after every chunk
    always_full: bool,
    delay: Option<Duration>,
}

impl CollectDestination {
    pub fn new(collected: Collected) -> Self {
        Self {
            collected,
            always_full: false,
            delay: None,
        }
    }

    pub fn always_full(mut self) -> Self {
        self.always_full = true;
        self
    }

    /// Sleep before accepting each chunk
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Destination for CollectDestination {
    fn write(&mut self, chunk: &str) -> io::Result<bool> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let mut inner = self.collected.lock();
        inner.text.push_str(chunk);
        inner.chunks.push(chunk.to_string());
        Ok(!self.always_full)
    }

    fn wait_drain(&mut self) -> io::Result<()> {
        self.collected.lock().drains += 1;
        Ok(())
    }

    fn end(&mut self) -> io::Result<()> {
        self.collected.lock().ended = true;
        Ok(())
    }
}

/// Fails on the first write
pub struct FailingDestination;

impl Destination for FailingDestination {
    fn write(&mut self, _chunk: &str) -> io::Result<bool> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
    }

    fn end(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Panics on the first write
pub struct PanickingDestination;

impl Destination for PanickingDestination {
    fn write(&mut self, _chunk: &str) -> io::Result<bool> {
        panic!("destination blew up");
    }

    fn end(&mut self) -> io::Result<()> {
        Ok(())
    }
}
