//! Stream controller
//!
//! `ThreadStream` is the producer side of a stream. It owns the pending
//! text, the worker handle and the observer lists, and is the only writer
//! of the write cursor.
//!
//! # Write paths
//!
//! - **Sync**: `write()` copies all pending text into the channel buffer
//!   before returning, blocking while the buffer is full.
//! - **Async**: `write()` copies what fits without blocking. The rest is
//!   moved by later `poll_events()` calls, the `flush()` future or the
//!   `wait_*` helpers (a "drain cycle").
//!
//! `write()` never looks at worker messages: until the caller drives
//! `poll_events()` (directly or through a wait), a stream that was not ready
//! stays not ready and writes are only queued.
//!
//! # Lifecycle
//!
//! ```text
//! Created -> Spawning -> Ready -> {Writing | Flushing} <-> Draining
//!                          |
//!                          +-> Ending -> Ended -> Closed
//! any -> Destroyed (fatal error, then Closed once the worker exits)
//! ```

mod events;
mod flush;

pub use events::{EventKind, Observer, Observers, StreamEvent};
pub use flush::Flush;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use threadstream_core::control::CursorSlot;
use threadstream_core::cursor::{Cursor, END_OF_STREAM};
use threadstream_core::error::{
    MisuseError, ProtocolError, StreamError, StreamResult, WorkerError,
};
use threadstream_core::state::ControllerState;
use threadstream_core::{kdebug, kerror, ktrace, kwarn};

use crate::buffer::{ChannelBuffer, Fill, PendingBuffer};
use crate::config::{StreamConfig, WaitPolicy, WriteMode};
use crate::destination::DestinationFactory;
use crate::message::{SideMessage, WorkerMessage};
use crate::shared::Shared;
use crate::wait::{self, WaitOutcome};
use crate::worker::{self, WorkerBootstrap, WorkerHandle};

/// Producer handle of a text stream drained by a dedicated worker thread
pub struct ThreadStream {
    config: StreamConfig,
    shared: Arc<Shared>,
    buffer: ChannelBuffer,
    worker: Option<WorkerHandle>,
    pending: PendingBuffer,
    state: ControllerState,

    /// Worker reported ready
    ready: bool,
    /// `end()` was called (possibly deferred)
    ending: bool,
    /// Consumer acknowledged end-of-stream
    finished: bool,
    /// Worker exited
    closed: bool,
    /// Async drain cycle owns the channel buffer
    flushing: bool,
    /// A write returned false; emit Drain once caught up
    need_drain: bool,

    /// First fatal error
    destroyed: Option<StreamError>,
    /// Worker messages taken off the mailbox but not dispatched yet
    inbox: VecDeque<WorkerMessage>,
    observers: Observers,
}

impl ThreadStream {
    /// Map the channel, spawn the worker and start building the destination.
    ///
    /// Returns before the destination exists; writes are queued until the
    /// worker reports ready.
    pub fn new<F: DestinationFactory>(config: StreamConfig, factory: F) -> StreamResult<Self> {
        config.validate()?;

        let shared = Shared::new(config.capacity)?;
        let worker = worker::spawn(WorkerBootstrap {
            factory: Box::new(factory),
            shared: Arc::clone(&shared),
            name: config.worker_name.clone(),
            stack_size: config.worker_stack_size,
            data: config.worker_data.clone(),
            poll_interval: config.poll_interval,
        })?;

        kdebug!(
            "stream {}: spawned (capacity {}, {:?})",
            config.worker_name,
            config.capacity,
            config.mode
        );

        Ok(Self {
            buffer: ChannelBuffer::new(Arc::clone(&shared)),
            shared,
            config,
            worker: Some(worker),
            pending: PendingBuffer::new(),
            state: ControllerState::Spawning,
            ready: false,
            ending: false,
            finished: false,
            closed: false,
            flushing: false,
            need_drain: false,
            destroyed: None,
            inbox: VecDeque::new(),
            observers: Observers::default(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.is_some()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Channel buffer capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Bytes accepted but not yet copied into the channel buffer
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn worker_name(&self) -> &str {
        &self.config.worker_name
    }

    #[inline]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Register `callback` for every event of `kind`
    pub fn on<F>(&mut self, kind: EventKind, callback: F)
    where
        F: FnMut(&StreamEvent) + Send + 'static,
    {
        self.observers.register(kind, Box::new(callback));
    }

    // ========================================================================
    // Producer operations
    // ========================================================================

    /// Queue `data` for the destination.
    ///
    /// Returns `Ok(false)` when the channel plus pending text has no room
    /// left; a `Drain` event follows once everything was handed over.
    pub fn write(&mut self, data: &str) -> StreamResult<bool> {
        self.check_live()?;
        if self.ending {
            return Err(MisuseError::WriteAfterEnd.into());
        }

        if self.pending.len() + data.len() >= self.config.max_pending_len {
            self.write_oversized(data)?;
        } else {
            self.pending.push(data);
            if self.ready && !self.flushing {
                let result = self.advance();
                self.guard(result)?;
            }
        }

        let headroom = self.headroom()?;
        if headroom <= 0 {
            self.need_drain = true;
        }
        Ok(headroom > 0)
    }

    /// Future that resolves once pending text was transferred and the
    /// consumer caught up. Never blocks the thread.
    pub fn flush(&mut self) -> Flush<'_> {
        Flush::new(self)
    }

    /// Block until pending text was transferred and the consumer caught up
    pub fn flush_sync(&mut self) -> StreamResult<()> {
        self.check_live()?;
        if self.flushing {
            return Err(MisuseError::FlushInProgress.into());
        }
        if self.finished {
            return Ok(());
        }
        if !self.ready {
            self.wait_ready()?;
        }

        let result = self
            .transfer_blocking("flush_sync")
            .and_then(|_| self.wait_drained("flush_sync"));
        self.guard(result)
    }

    /// Finish the stream.
    ///
    /// Idempotent. While the worker is not ready or an async drain cycle is
    /// running, the end is recorded and completed by `poll_events()`.
    /// Otherwise pending text is transferred, the consumer is waited for and
    /// the end-of-stream acknowledgement is awaited (bounded by
    /// `end_policy`).
    pub fn end(&mut self) -> StreamResult<()> {
        self.check_live()?;
        if self.ending {
            return Ok(());
        }
        self.ending = true;

        if !self.ready || self.flushing {
            kdebug!("stream {}: end deferred", self.config.worker_name);
            return Ok(());
        }

        let result = self.run_end();
        self.guard(result)
    }

    /// Send an application message to the worker
    pub fn post_message(&mut self, msg: SideMessage) -> StreamResult<()> {
        self.check_live()?;
        self.shared.to_worker.post(msg);
        Ok(())
    }

    /// Dispatch worker messages and advance outstanding work: a running
    /// async cycle, text queued before the worker was ready, a deferred
    /// end, a pending Drain.
    ///
    /// Sync streams and deferred ends block here the way `write()` and
    /// `end()` would. Failures surface as an `Error` event and on the next
    /// call.
    pub fn poll_events(&mut self) {
        self.dispatch_messages();
        if self.destroyed.is_some() || !self.ready {
            return;
        }

        let result = if self.flushing {
            self.advance_async()
        } else if !self.pending.is_empty() {
            self.advance()
        } else {
            Ok(())
        };
        if self.guard(result).is_err() {
            return;
        }

        if self.ending && !self.finished && !self.flushing {
            let result = self.run_end();
            if self.guard(result).is_err() {
                return;
            }
        }

        self.maybe_emit_drain();
    }

    /// `poll_events` minus everything that may block: copies what fits and
    /// leaves a deferred end alone
    pub(super) fn poll_progress(&mut self) {
        self.dispatch_messages();
        if self.destroyed.is_some() || !self.ready {
            return;
        }

        if self.flushing || !self.pending.is_empty() {
            let result = self.advance_async();
            if self.guard(result).is_err() {
                return;
            }
        }

        self.maybe_emit_drain();
    }

    /// Block until the worker reported ready
    pub fn wait_ready(&mut self) -> StreamResult<()> {
        let policy = self.config.flush_policy;
        let mut timeouts = 0;
        loop {
            let marks = self.progress_marks();
            self.poll_events();
            self.check_live()?;
            if self.ready {
                return Ok(());
            }
            if self.wait_progress(marks, policy.interval) == WaitOutcome::TimedOut {
                timeouts += 1;
                if timeouts >= policy.retries {
                    return Err(took_too_long("wait_ready", policy));
                }
            }
        }
    }

    /// Block until the worker thread exited.
    ///
    /// Drives deferred ends and async cycles. Returns the destroy cause if
    /// the stream did not close cleanly.
    pub fn wait_closed(&mut self) -> StreamResult<()> {
        let policy = self.config.end_policy;
        let mut timeouts = 0;
        loop {
            let marks = self.progress_marks();
            self.poll_events();
            if self.closed {
                return self.check_live();
            }
            if self.wait_progress(marks, policy.interval) == WaitOutcome::TimedOut {
                timeouts += 1;
                if timeouts >= policy.retries {
                    return Err(took_too_long("wait_closed", policy));
                }
            }
        }
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    /// Move pending text according to the write mode
    fn advance(&mut self) -> StreamResult<()> {
        match self.config.mode {
            WriteMode::Sync => self.transfer_blocking("write"),
            WriteMode::Async => self.advance_async(),
        }
    }

    /// Copy all pending text, waiting for the consumer on every full buffer
    fn transfer_blocking(&mut self, operation: &'static str) -> StreamResult<()> {
        self.state = ControllerState::Writing;
        while !self.pending.is_empty() {
            match self.buffer.fill(self.pending.as_str())? {
                Fill::Copied(n) => self.pending.consume(n),
                Fill::Full => {
                    self.wait_drained(operation)?;
                    self.buffer.rewind()?;
                }
                Fill::Rewinding => self.wait_rewound(operation)?,
            }
        }
        self.flushing = false;
        self.state = ControllerState::Ready;
        Ok(())
    }

    /// Copy as much as possible without blocking. Leaves `flushing` set
    /// while pending text remains.
    fn advance_async(&mut self) -> StreamResult<()> {
        loop {
            if self.pending.is_empty() {
                self.flushing = false;
                self.state = ControllerState::Ready;
                return Ok(());
            }

            self.flushing = true;
            self.state = ControllerState::Flushing;
            match self.buffer.fill(self.pending.as_str())? {
                Fill::Copied(n) => self.pending.consume(n),
                Fill::Full => {
                    if !self.buffer.is_drained()? {
                        self.state = ControllerState::Draining;
                        return Ok(());
                    }
                    self.buffer.rewind()?;
                }
                Fill::Rewinding => {
                    self.state = ControllerState::Draining;
                    return Ok(());
                }
            }
        }
    }

    fn write_oversized(&mut self, data: &str) -> StreamResult<()> {
        kdebug!(
            "stream {}: {} bytes over the pending limit, writing through",
            self.config.worker_name,
            self.pending.len() + data.len()
        );
        if !self.ready {
            self.wait_ready()?;
        }
        self.pending.push(data);
        let result = self.transfer_blocking("write");
        self.guard(result)
    }

    /// Block until `read == write`, bounded by the flush policy
    fn wait_drained(&mut self, operation: &'static str) -> StreamResult<()> {
        let policy = self.config.flush_policy;
        let previous = self.state;
        self.state = ControllerState::Draining;

        let mut timeouts = 0;
        loop {
            let (write, read) = self.buffer.positions()?;
            if write == read {
                break;
            }
            let cell = self.shared.control().cell(CursorSlot::Read);
            if wait::wait_until_different(cell, read as i32, Some(policy.interval))
                == WaitOutcome::TimedOut
            {
                timeouts += 1;
                if timeouts >= policy.retries {
                    return Err(took_too_long(operation, policy));
                }
            }
        }

        self.state = previous;
        Ok(())
    }

    /// Block until the consumer answered a rewind, bounded by the flush
    /// policy
    fn wait_rewound(&mut self, operation: &'static str) -> StreamResult<()> {
        let policy = self.config.flush_policy;
        let previous = self.state;
        self.state = ControllerState::Draining;

        let mut timeouts = 0;
        loop {
            let read = self.shared.control().load_raw(CursorSlot::Read);
            if self.buffer.rewind_acknowledged()? {
                break;
            }
            let cell = self.shared.control().cell(CursorSlot::Read);
            if wait::wait_until_different(cell, read, Some(policy.interval))
                == WaitOutcome::TimedOut
            {
                timeouts += 1;
                if timeouts >= policy.retries {
                    return Err(took_too_long(operation, policy));
                }
            }
        }

        self.state = previous;
        Ok(())
    }

    /// End-of-stream handshake
    fn run_end(&mut self) -> StreamResult<()> {
        self.transfer_blocking("end")?;
        self.wait_drained("end")?;

        self.state = ControllerState::Ending;
        self.shared.publish(CursorSlot::Write, Cursor::EndOfStream);
        kdebug!("stream {}: end of stream sent", self.config.worker_name);

        let policy = self.config.end_policy;
        let mut timeouts = 0;
        loop {
            match self.shared.control().read_cursor()? {
                Cursor::EndOfStream => break,
                Cursor::ConsumerFault => return Err(ProtocolError::ConsumerFault.into()),
                Cursor::Offset(read) => {
                    let cell = self.shared.control().cell(CursorSlot::Read);
                    if wait::wait_until_different(cell, read as i32, Some(policy.interval))
                        == WaitOutcome::TimedOut
                    {
                        timeouts += 1;
                        if timeouts >= policy.retries {
                            return Err(took_too_long("end", policy));
                        }
                    }
                }
            }
        }

        self.state = ControllerState::Ended;
        self.finished = true;
        self.emit(StreamEvent::Finish);
        Ok(())
    }

    /// Free space: capacity minus pending minus in flight
    fn headroom(&mut self) -> StreamResult<i64> {
        let in_flight = match self.buffer.unconsumed() {
            Ok(n) => n,
            Err(e) => return Err(self.fail(e)),
        };
        Ok(self.buffer.capacity() as i64 - self.pending.len() as i64 - in_flight as i64)
    }

    fn maybe_emit_drain(&mut self) {
        if !self.need_drain || self.flushing || self.finished || !self.pending.is_empty() {
            return;
        }
        match self.buffer.is_drained() {
            Ok(true) => {
                self.need_drain = false;
                ktrace!("stream {}: drained", self.config.worker_name);
                self.emit(StreamEvent::Drain);
            }
            Ok(false) => {}
            Err(e) => {
                self.fail(e);
            }
        }
    }

    // ========================================================================
    // Worker messages
    // ========================================================================

    fn dispatch_messages(&mut self) {
        while let Some(msg) = self
            .inbox
            .pop_front()
            .or_else(|| self.shared.to_producer.try_recv())
        {
            self.handle_message(msg);
        }
    }

    fn handle_message(&mut self, msg: WorkerMessage) {
        match msg {
            WorkerMessage::Ready => {
                if self.ready || self.destroyed.is_some() {
                    return;
                }
                self.ready = true;
                self.state = ControllerState::Ready;
                kdebug!("stream {}: ready", self.config.worker_name);
                self.emit(StreamEvent::Ready);
            }
            WorkerMessage::Error(cause) => self.destroy(cause),
            WorkerMessage::Event(msg) => self.emit(StreamEvent::Message(msg)),
            WorkerMessage::Exit(status) => self.handle_exit(status),
        }
    }

    fn handle_exit(&mut self, status: i32) {
        if status != 0 {
            self.destroy(WorkerError::Exited { status }.into());
        } else if !self.finished && self.destroyed.is_none() {
            kwarn!(
                "stream {}: worker exited before the end of the stream",
                self.config.worker_name
            );
            self.destroy(WorkerError::ExitedBeforeEnd.into());
        }

        self.closed = true;
        self.state = ControllerState::Closed;
        kdebug!("stream {}: closed (status {})", self.config.worker_name, status);
        self.emit(StreamEvent::Close);
    }

    /// Snapshot of what a blocking wait should watch for changes
    fn progress_marks(&self) -> (i32, i32) {
        (
            self.shared.to_producer.sequence(),
            self.shared.control().load_raw(CursorSlot::Read),
        )
    }

    /// Sleep until a message arrives or, during an async cycle, the
    /// consumer moves
    fn wait_progress(&self, (seen, read): (i32, i32), interval: Duration) -> WaitOutcome {
        if self.flushing {
            let cell = self.shared.control().cell(CursorSlot::Read);
            wait::wait_until_different(cell, read, Some(interval))
        } else {
            self.shared.to_producer.wait(seen, Some(interval))
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    fn check_live(&self) -> StreamResult<()> {
        match &self.destroyed {
            Some(cause) => Err(StreamError::destroyed(cause.clone())),
            None => Ok(()),
        }
    }

    /// Destroy on fatal errors, passing the error through
    fn guard<T>(&mut self, result: StreamResult<T>) -> StreamResult<T> {
        result.map_err(|e| self.fail(e))
    }

    fn fail(&mut self, err: StreamError) -> StreamError {
        if !err.is_fatal() {
            return err;
        }
        if let Some(cause) = &self.destroyed {
            return StreamError::destroyed(cause.clone());
        }
        let cause = self.explain(err);
        self.destroy(cause.clone());
        cause
    }

    /// A consumer fault sentinel is only a symptom; the worker posts the
    /// cause before storing it
    fn explain(&mut self, err: StreamError) -> StreamError {
        if err != StreamError::Protocol(ProtocolError::ConsumerFault) {
            return err;
        }
        while let Some(msg) = self.shared.to_producer.try_recv() {
            self.inbox.push_back(msg);
        }
        self.inbox
            .iter()
            .find_map(|msg| match msg {
                WorkerMessage::Error(cause) => Some(cause.clone()),
                WorkerMessage::Exit(status) if *status != 0 => {
                    Some(WorkerError::Exited { status: *status }.into())
                }
                _ => None,
            })
            .unwrap_or(err)
    }

    fn destroy(&mut self, cause: StreamError) {
        if self.destroyed.is_some() {
            return;
        }
        kerror!("stream {}: destroyed: {}", self.config.worker_name, cause);

        self.destroyed = Some(cause.clone());
        self.state = ControllerState::Destroyed;
        self.flushing = false;
        self.need_drain = false;
        self.pending.clear();

        // Ask the pump to stop
        if self.shared.control().load_raw(CursorSlot::Write) != END_OF_STREAM {
            self.shared.publish(CursorSlot::Write, Cursor::EndOfStream);
        }

        self.emit(StreamEvent::Error(cause));
    }

    #[inline]
    fn emit(&mut self, event: StreamEvent) {
        self.observers.emit(&event);
    }

    /// Best-effort end for a stream dropped while live
    fn close_on_drop(&mut self) -> StreamResult<()> {
        if !self.finished {
            self.wait_ready()?;
            self.ending = true;
            let result = self.run_end();
            self.guard(result)?;
        }
        self.wait_closed()
    }
}

impl Drop for ThreadStream {
    fn drop(&mut self) {
        if self.destroyed.is_none() && !self.closed {
            if let Err(e) = self.close_on_drop() {
                kwarn!("stream {}: end on drop failed: {}", self.config.worker_name, e);
            }
        }

        if let Some(worker) = self.worker.take() {
            // Exit is the worker's last act, so a closed worker joins promptly
            if self.closed || worker.is_finished() {
                worker.join();
            }
        }
    }
}

fn took_too_long(operation: &'static str, policy: WaitPolicy) -> StreamError {
    StreamError::TookTooLong {
        operation,
        waited: policy.budget(),
    }
}
