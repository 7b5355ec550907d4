//! Unix memory implementation using mmap

use std::ptr::NonNull;
use threadstream_core::error::{StreamError, StreamResult};
use threadstream_core::kwarn;

/// Map `len` bytes of zeroed, shared, read/write memory
pub(super) fn map_region(len: usize) -> StreamResult<NonNull<u8>> {
    // MAP_SHARED so both threads see one set of pages even across fork
    let base = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if base == libc::MAP_FAILED {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        return Err(StreamError::MapFailed(errno));
    }

    NonNull::new(base as *mut u8).ok_or(StreamError::MapFailed(0))
}

/// Release a mapping created by `map_region`
pub(super) fn unmap_region(base: NonNull<u8>, len: usize) {
    let ret = unsafe { libc::munmap(base.as_ptr() as *mut libc::c_void, len) };
    if ret != 0 {
        kwarn!("munmap failed: {}", std::io::Error::last_os_error());
    }
}
