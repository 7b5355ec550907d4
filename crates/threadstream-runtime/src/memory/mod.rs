//! Shared memory region for one stream
//!
//! One contiguous, zero-initialized mapping per stream:
//!
//! ```text
//! 0x00   ControlBlock (128 bytes, two cursor cache lines)
//! 0x80   data bytes [0, capacity)
//! ```
//!
//! Platform-specific implementations handle the allocation.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix::{map_region, unmap_region};
    } else {
        mod heap;
        use heap::{map_region, unmap_region};
    }
}

use std::ptr::NonNull;
use threadstream_core::constants::{MAX_CAPACITY, MIN_CAPACITY};
use threadstream_core::control::{ControlBlock, CONTROL_BLOCK_SIZE};
use threadstream_core::error::{StreamError, StreamResult};

/// Control block plus data bytes, shared by producer and consumer
pub struct SharedRegion {
    /// Base address of the mapping
    base: NonNull<u8>,

    /// Total mapped size (control block + capacity)
    len: usize,

    /// Data area size in bytes
    capacity: usize,
}

// Safety: the region is plain memory. Cursor cells are atomics; the data
// area is only written by the producer in [write, capacity) and only read by
// the consumer in [read, write), which the cursor protocol keeps disjoint.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Map a zeroed region with `capacity` data bytes
    pub fn new(capacity: usize) -> StreamResult<Self> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(StreamError::InvalidConfig("capacity out of range"));
        }
        let len = CONTROL_BLOCK_SIZE
            .checked_add(capacity)
            .ok_or(StreamError::InvalidConfig("capacity out of range"))?;

        let base = map_region(len)?;
        Ok(Self { base, len, capacity })
    }

    /// Data area size in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The cursors
    #[inline]
    pub fn control(&self) -> &ControlBlock {
        // Safety: the mapping is page aligned, zeroed (= both cursors 0) and
        // lives as long as self
        unsafe { &*(self.base.as_ptr() as *const ControlBlock) }
    }

    #[inline]
    fn data_ptr(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(CONTROL_BLOCK_SIZE) }
    }

    /// Copy `bytes` into the data area at `offset`.
    ///
    /// # Safety
    ///
    /// Producer only. `[offset, offset + bytes.len())` must lie at or past
    /// the published write cursor and within capacity.
    #[inline]
    pub unsafe fn write_at(&self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() <= self.capacity);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.data_ptr().add(offset), bytes.len());
    }

    /// Borrow `[from, to)` of the data area.
    ///
    /// # Safety
    ///
    /// Consumer only. The range must have been published by the write
    /// cursor and not yet released through the read cursor.
    #[inline]
    pub unsafe fn slice(&self, from: usize, to: usize) -> &[u8] {
        debug_assert!(from <= to && to <= self.capacity);
        std::slice::from_raw_parts(self.data_ptr().add(from), to - from)
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unmap_region(self.base, self.len);
    }
}
