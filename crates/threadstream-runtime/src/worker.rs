//! Worker thread management
//!
//! Each stream owns exactly one worker: a named OS thread that builds the
//! destination, reports ready and runs the pump until end-of-stream.
//!
//! Whatever happens on the worker, its last act is posting `Exit(status)`:
//! 0 after a clean end, 1 after an error, 101 after a panic. A non-zero
//! exit also stores the consumer-fault sentinel so a producer blocked on
//! the read cursor wakes up.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use threadstream_core::control::CursorSlot;
use threadstream_core::error::{StreamError, StreamResult, WorkerError};
use threadstream_core::{kdebug, kerror, VERSION};

use crate::destination::DestinationFactory;
use crate::message::{SideMessage, WorkerMessage};
use crate::pump::{destination_error, Pump};
use crate::shared::Shared;

/// Exit status of a worker that returned an error
pub const EXIT_ERROR: i32 = 1;

/// Exit status of a worker that panicked
pub const EXIT_PANIC: i32 = 101;

/// What the destination factory can see of its worker
pub struct WorkerContext {
    name: String,
    data: String,
    handle: ContextHandle,
}

impl WorkerContext {
    /// Worker thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Library version
    pub fn version(&self) -> &'static str {
        VERSION
    }

    /// Opaque data from `StreamConfig::worker_data`
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Side-channel handle, cloneable into the destination
    pub fn handle(&self) -> &ContextHandle {
        &self.handle
    }
}

/// Worker end of the side channel
#[derive(Clone)]
pub struct ContextHandle {
    shared: Arc<Shared>,
}

impl ContextHandle {
    /// Send an application message to the producer
    pub fn emit(&self, msg: SideMessage) {
        self.shared.to_producer.post(WorkerMessage::Event(msg));
    }

    /// Next message posted by the producer, if any
    pub fn try_recv(&self) -> Option<SideMessage> {
        self.shared.to_worker.try_recv()
    }

    /// Wait up to `timeout` for a message from the producer
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SideMessage> {
        self.shared.to_worker.recv_timeout(timeout)
    }
}

/// Everything moved into the worker thread at spawn
pub struct WorkerBootstrap {
    pub factory: Box<dyn DestinationFactory>,
    pub shared: Arc<Shared>,
    pub name: String,
    pub stack_size: Option<usize>,
    pub data: String,
    pub poll_interval: Duration,
}

/// Owning handle to the worker thread
pub struct WorkerHandle {
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> Option<&str> {
        self.handle.thread().name()
    }

    /// Thread has run to completion
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread. A panic was already reported through `Exit`.
    pub fn join(self) {
        let _ = self.handle.join();
    }
}

/// Spawn the worker thread
pub fn spawn(bootstrap: WorkerBootstrap) -> StreamResult<WorkerHandle> {
    let mut builder = thread::Builder::new().name(bootstrap.name.clone());
    if let Some(stack_size) = bootstrap.stack_size {
        builder = builder.stack_size(stack_size);
    }

    let handle = builder
        .spawn(move || worker_main(bootstrap))
        .map_err(|e| StreamError::Worker(WorkerError::SpawnFailed(e.to_string())))?;

    Ok(WorkerHandle { handle })
}

/// Posts `Exit` when the worker returns or unwinds
struct ExitGuard {
    shared: Arc<Shared>,
    status: i32,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.status = EXIT_PANIC;
            kerror!("worker panicked");
            self.shared.to_producer.post(WorkerMessage::Error(StreamError::Worker(
                WorkerError::Exited { status: EXIT_PANIC },
            )));
        }

        if self.status != 0 {
            self.shared.control().mark_consumer_fault();
            self.shared.notify(CursorSlot::Read);
        }

        kdebug!("worker exiting with status {}", self.status);
        self.shared.to_producer.post(WorkerMessage::Exit(self.status));
    }
}

fn worker_main(bootstrap: WorkerBootstrap) {
    let WorkerBootstrap {
        factory,
        shared,
        name,
        data,
        poll_interval,
        ..
    } = bootstrap;

    let mut guard = ExitGuard {
        shared: Arc::clone(&shared),
        status: EXIT_ERROR,
    };

    let ctx = WorkerContext {
        name,
        data,
        handle: ContextHandle {
            shared: Arc::clone(&shared),
        },
    };

    match run(&shared, factory, &ctx, poll_interval) {
        Ok(()) => guard.status = 0,
        Err(e) => {
            kerror!("worker {}: {}", ctx.name, e);
            shared.to_producer.post(WorkerMessage::Error(e));
            guard.status = EXIT_ERROR;
        }
    }
}

fn run(
    shared: &Arc<Shared>,
    factory: Box<dyn DestinationFactory>,
    ctx: &WorkerContext,
    poll_interval: Duration,
) -> StreamResult<()> {
    let destination = factory.create(ctx).map_err(destination_error)?;

    kdebug!("worker {}: destination ready", ctx.name);
    shared.to_producer.post(WorkerMessage::Ready);

    Pump::new(Arc::clone(shared), destination, poll_interval).run()
}
