//! State shared by the producer and the worker thread

use futures::task::AtomicWaker;
use std::sync::atomic::AtomicI32;
use std::sync::Arc;
use std::task::Waker;

use threadstream_core::control::{ControlBlock, CursorSlot};
use threadstream_core::cursor::Cursor;
use threadstream_core::error::StreamResult;

use crate::memory::SharedRegion;
use crate::message::{Mailbox, SideMessage, WorkerMessage};
use crate::wait::{self, Watch};

/// Everything both contexts hold a reference to
pub struct Shared {
    region: SharedRegion,
    /// Async waiters per cursor, indexed by `slot_index`
    wakers: [AtomicWaker; 2],
    /// Worker → producer
    pub(crate) to_producer: Mailbox<WorkerMessage>,
    /// Producer → worker
    pub(crate) to_worker: Mailbox<SideMessage>,
}

#[inline]
fn slot_index(slot: CursorSlot) -> usize {
    match slot {
        CursorSlot::Write => 0,
        CursorSlot::Read => 1,
    }
}

impl Shared {
    pub fn new(capacity: usize) -> StreamResult<Arc<Self>> {
        Ok(Arc::new(Self {
            region: SharedRegion::new(capacity)?,
            wakers: [AtomicWaker::new(), AtomicWaker::new()],
            to_producer: Mailbox::new(),
            to_worker: Mailbox::new(),
        }))
    }

    #[inline]
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    #[inline]
    pub fn control(&self) -> &ControlBlock {
        self.region.control()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Wake every waiter on `slot`, blocking and cooperative
    pub fn notify(&self, slot: CursorSlot) {
        wait::notify(self.control().cell(slot));
        self.wakers[slot_index(slot)].wake();
    }

    /// Store then notify
    #[inline]
    pub fn publish(&self, slot: CursorSlot, cursor: Cursor) {
        self.control().store(slot, cursor);
        self.notify(slot);
    }

    /// Handle for cooperative waits on `slot`
    pub fn watch(self: &Arc<Self>, slot: CursorSlot) -> CursorWatch {
        CursorWatch {
            shared: Arc::clone(self),
            slot,
        }
    }
}

/// A cursor cell plus its async waker slot
pub struct CursorWatch {
    shared: Arc<Shared>,
    slot: CursorSlot,
}

impl Watch for CursorWatch {
    fn cell(&self) -> &AtomicI32 {
        self.shared.control().cell(self.slot)
    }

    fn register(&self, waker: &Waker) {
        self.shared.wakers[slot_index(self.slot)].register(waker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::{CooperativeWait, Predicate, WaitOutcome};
    use futures::executor::block_on;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_publish_wakes_cooperative_waiter() {
        let shared = Shared::new(32).unwrap();
        let producer = Arc::clone(&shared);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            producer.publish(CursorSlot::Write, Cursor::Offset(5));
        });

        // Poll interval far beyond the test timeout: only the notify can wake
        let wait = CooperativeWait::new(
            shared.watch(CursorSlot::Write),
            Predicate::Equal(5),
            Some(Duration::from_secs(10)),
            Duration::from_secs(60),
        );
        assert_eq!(block_on(wait), WaitOutcome::Ok);
        handle.join().unwrap();
    }
}
