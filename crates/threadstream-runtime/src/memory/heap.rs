//! Heap-backed region for platforms without mmap

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use threadstream_core::constants::CACHE_LINE_SIZE;
use threadstream_core::error::{StreamError, StreamResult};

fn layout(len: usize) -> StreamResult<Layout> {
    Layout::from_size_align(len, CACHE_LINE_SIZE)
        .map_err(|_| StreamError::InvalidConfig("capacity out of range"))
}

pub(super) fn map_region(len: usize) -> StreamResult<NonNull<u8>> {
    let layout = layout(len)?;
    // Safety: len includes the control block, never zero
    let ptr = unsafe { alloc_zeroed(layout) };
    NonNull::new(ptr).ok_or(StreamError::MapFailed(0))
}

pub(super) fn unmap_region(base: NonNull<u8>, len: usize) {
    if let Ok(layout) = layout(len) {
        unsafe { dealloc(base.as_ptr(), layout) };
    }
}
