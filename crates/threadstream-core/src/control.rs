//! Shared control block layout
//!
//! The control block is the first 128 bytes of the shared region. It holds
//! the two cursors, each on its own cache line so the producer's stores to
//! `write_index` do not bounce the line the consumer stores `read_index` to.
//!
//! ```text
//! 0x00  write_index: i32   (producer stores, consumer waits on)
//! 0x40  read_index:  i32   (consumer stores, producer waits on)
//! 0x80  end
//! ```
//!
//! Each cell has one writer. The producer owns `write_index`, the consumer
//! owns `read_index`. Rewinding to the start of the buffer is a handshake:
//! the producer stores `write = 0` once `read == write`, and the consumer,
//! seeing `write` below its own position, answers with `read = 0`. Neither
//! cell ever returns to a value its waiter is sleeping on.
//!
//! Only load/store wrappers live here. Waking waiters needs the OS and is
//! done by the runtime's wait module after each store.

use crate::constants::CACHE_LINE_SIZE;
use crate::cursor::Cursor;
use crate::error::StreamResult;
use std::sync::atomic::{AtomicI32, Ordering};

/// Size of the control block in bytes
pub const CONTROL_BLOCK_SIZE: usize = 2 * CACHE_LINE_SIZE;

/// Which cursor cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorSlot {
    Write,
    Read,
}

/// The two shared cursors
#[repr(C, align(64))]
pub struct ControlBlock {
    write_index: AtomicI32,
    _pad0: [u8; CACHE_LINE_SIZE - 4],
    read_index: AtomicI32,
    _pad1: [u8; CACHE_LINE_SIZE - 4],
}

const _: () = assert!(std::mem::size_of::<ControlBlock>() == CONTROL_BLOCK_SIZE);

impl ControlBlock {
    /// A control block with both cursors at offset 0
    pub const fn new() -> Self {
        Self {
            write_index: AtomicI32::new(0),
            _pad0: [0; CACHE_LINE_SIZE - 4],
            read_index: AtomicI32::new(0),
            _pad1: [0; CACHE_LINE_SIZE - 4],
        }
    }

    /// The raw atomic cell, for native waits
    #[inline]
    pub fn cell(&self, slot: CursorSlot) -> &AtomicI32 {
        match slot {
            CursorSlot::Write => &self.write_index,
            CursorSlot::Read => &self.read_index,
        }
    }

    /// Raw load, sentinels included
    #[inline]
    pub fn load_raw(&self, slot: CursorSlot) -> i32 {
        self.cell(slot).load(Ordering::SeqCst)
    }

    /// Load and decode
    #[inline]
    pub fn load(&self, slot: CursorSlot) -> StreamResult<Cursor> {
        Cursor::from_raw(self.load_raw(slot))
    }

    /// Encode and store
    #[inline]
    pub fn store(&self, slot: CursorSlot, cursor: Cursor) {
        self.cell(slot).store(cursor.to_raw(), Ordering::SeqCst);
    }

    /// Producer side: current write cursor
    #[inline]
    pub fn write_cursor(&self) -> StreamResult<Cursor> {
        self.load(CursorSlot::Write)
    }

    /// Consumer side progress
    #[inline]
    pub fn read_cursor(&self) -> StreamResult<Cursor> {
        self.load(CursorSlot::Read)
    }

    /// Store the fault sentinel unless the consumer already acknowledged
    /// end-of-stream. Returns whether the sentinel was stored.
    pub fn mark_consumer_fault(&self) -> bool {
        let cell = &self.read_index;
        let mut current = cell.load(Ordering::SeqCst);
        loop {
            if Cursor::from_raw(current).map(|c| c.is_sentinel()).unwrap_or(false) {
                return false;
            }
            match cell.compare_exchange(
                current,
                Cursor::ConsumerFault.to_raw(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{CONSUMER_FAULT, END_OF_STREAM};

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<ControlBlock>(), 128);
        assert_eq!(std::mem::align_of::<ControlBlock>(), 64);

        let block = ControlBlock::new();
        let base = &block as *const ControlBlock as usize;
        let write = block.cell(CursorSlot::Write) as *const AtomicI32 as usize;
        let read = block.cell(CursorSlot::Read) as *const AtomicI32 as usize;
        assert_eq!(write - base, 0);
        assert_eq!(read - base, 64);
    }

    #[test]
    fn test_cursor_cells_are_lock_free() {
        // Native 32-bit atomics, so futex waits operate on the cell itself
        assert!(cfg!(target_has_atomic = "32"));
        assert_eq!(std::mem::size_of::<AtomicI32>(), 4);
    }

    #[test]
    fn test_store_load_roundtrip() {
        let block = ControlBlock::new();
        block.store(CursorSlot::Write, Cursor::Offset(42));
        block.store(CursorSlot::Read, Cursor::Offset(40));
        assert_eq!(block.write_cursor().unwrap(), Cursor::Offset(42));
        assert_eq!(block.read_cursor().unwrap(), Cursor::Offset(40));

        block.store(CursorSlot::Write, Cursor::EndOfStream);
        assert_eq!(block.load_raw(CursorSlot::Write), END_OF_STREAM);
    }

    #[test]
    fn test_fault_set_once() {
        let block = ControlBlock::new();
        assert!(block.mark_consumer_fault());
        assert_eq!(block.load_raw(CursorSlot::Read), CONSUMER_FAULT);
        assert!(!block.mark_consumer_fault());

        let acked = ControlBlock::new();
        acked.store(CursorSlot::Read, Cursor::EndOfStream);
        assert!(!acked.mark_consumer_fault());
        assert_eq!(acked.load_raw(CursorSlot::Read), END_OF_STREAM);
    }
}
