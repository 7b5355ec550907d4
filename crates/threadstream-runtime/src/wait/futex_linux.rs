//! Linux futex-based atomic wait
//!
//! Uses the futex syscall directly on the cursor cell: `FUTEX_WAIT` sleeps
//! only if the cell still holds the value the caller last saw, so a store
//! that lands between the caller's load and the syscall is never missed.
//!
//! Both execution contexts are threads of one process sharing the mapping,
//! so the private futex flag applies.

use super::AtomicWait;
use std::sync::atomic::AtomicI32;
use std::time::Duration;

/// Linux futex-based wait
pub struct FutexWait;

impl AtomicWait for FutexWait {
    fn wait(cell: &AtomicI32, current: i32, timeout: Option<Duration>) {
        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });

        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // FUTEX_WAIT: sleep if *cell == current (relative timeout).
        // ETIMEDOUT, EAGAIN (value changed) and EINTR all mean "re-check".
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                cell.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                current,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn wake_all(cell: &AtomicI32) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                cell.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                i32::MAX,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}
