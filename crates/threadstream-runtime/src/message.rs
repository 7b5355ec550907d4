//! Side-channel mailboxes between producer and worker
//!
//! Lifecycle and application messages do not go through the channel buffer.
//! Each direction is a lock-free queue plus a sequence word: `post` pushes,
//! bumps the word and wakes both blocking waiters (futex on the word) and an
//! async task (registered waker).

use crossbeam_queue::SegQueue;
use futures::task::AtomicWaker;
use std::sync::atomic::{AtomicI32, Ordering};
use std::task::Waker;
use std::time::Duration;

use threadstream_core::error::StreamError;

use crate::wait::{self, WaitOutcome};

/// Application-level message passed alongside the text stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideMessage {
    /// Message name, chosen by the application
    pub name: String,
    /// Opaque body
    pub payload: Vec<u8>,
}

impl SideMessage {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Payload as UTF-8, if it is
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Worker → producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Destination constructed, stream may be written
    Ready,
    /// Worker failed; the cause is final
    Error(StreamError),
    /// Application message from the destination
    Event(SideMessage),
    /// Worker thread is exiting with this status (always the last message)
    Exit(i32),
}

/// One-direction mailbox
pub struct Mailbox<T> {
    queue: SegQueue<T>,
    seq: AtomicI32,
    waker: AtomicWaker,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            seq: AtomicI32::new(0),
            waker: AtomicWaker::new(),
        }
    }

    /// Enqueue and wake the receiver
    pub fn post(&self, msg: T) {
        self.queue.push(msg);
        self.seq.fetch_add(1, Ordering::SeqCst);
        wait::notify(&self.seq);
        self.waker.wake();
    }

    #[inline]
    pub fn try_recv(&self) -> Option<T> {
        self.queue.pop()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Current sequence word; pass to `wait` to sleep until the next post
    #[inline]
    pub fn sequence(&self) -> i32 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Block until a post after `seen`, or `timeout`
    pub fn wait(&self, seen: i32, timeout: Option<Duration>) -> WaitOutcome {
        wait::wait_until_different(&self.seq, seen, timeout)
    }

    /// Blocking receive with a timeout
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        loop {
            let seen = self.sequence();
            if let Some(msg) = self.try_recv() {
                return Some(msg);
            }
            if !self.wait(seen, Some(timeout)).is_ok() {
                return self.try_recv();
            }
        }
    }

    /// Wake `waker` on the next post
    #[inline]
    pub fn register(&self, waker: &Waker) {
        self.waker.register(waker);
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
