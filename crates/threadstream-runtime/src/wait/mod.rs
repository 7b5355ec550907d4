//! Wait primitive
//!
//! "Wait until this atomic cell equals / differs from X", with a timeout.
//!
//! Two disciplines:
//! - **Blocking** (`wait_until_equal`, `wait_until_different`): parks the OS
//!   thread on the cell itself. Used by the consumer thread and the
//!   producer's synchronous path.
//! - **Cooperative** (`CooperativeWait`): a `Future` for the producer's
//!   asynchronous path. Never parks the thread.
//!
//! Every store to a cursor is followed by `notify()`, which wakes both
//! kinds of waiter. Wakes may be spurious or coalesced, so both variants
//! re-check the predicate after each one.

mod cooperative;

pub use cooperative::{CooperativeWait, Predicate, Watch};

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

/// Platform-specific blocking wait on a 32-bit atomic
///
/// `wait` returns when woken, on timeout, or spuriously; callers re-check.
pub trait AtomicWait {
    /// Block while `cell == current`, for at most `timeout` (None = forever)
    fn wait(cell: &AtomicI32, current: i32, timeout: Option<Duration>);

    /// Wake every thread blocked in `wait` on `cell`
    fn wake_all(cell: &AtomicI32);
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexWait as PlatformWait;
    } else {
        mod fallback;
        pub use fallback::CondvarWait as PlatformWait;
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Predicate held
    Ok,
    /// Timeout elapsed first
    TimedOut,
}

impl WaitOutcome {
    #[inline]
    pub fn is_ok(self) -> bool {
        self == WaitOutcome::Ok
    }
}

/// Wake blocking waiters on `cell`
#[inline]
pub fn notify(cell: &AtomicI32) {
    PlatformWait::wake_all(cell);
}

/// Block until `cell == expected` or `timeout` elapses
pub fn wait_until_equal(cell: &AtomicI32, expected: i32, timeout: Option<Duration>) -> WaitOutcome {
    wait_blocking(cell, Predicate::Equal(expected), timeout)
}

/// Block until `cell != expected` or `timeout` elapses
pub fn wait_until_different(
    cell: &AtomicI32,
    expected: i32,
    timeout: Option<Duration>,
) -> WaitOutcome {
    wait_blocking(cell, Predicate::Different(expected), timeout)
}

fn wait_blocking(cell: &AtomicI32, predicate: Predicate, timeout: Option<Duration>) -> WaitOutcome {
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let current = cell.load(Ordering::SeqCst);
        if predicate.holds(current) {
            return WaitOutcome::Ok;
        }

        let remaining = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return WaitOutcome::TimedOut;
                }
                Some(deadline - now)
            }
            None => None,
        };

        // Sleeps only while the value is still `current`
        PlatformWait::wait(cell, current, remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_already_satisfied() {
        let cell = AtomicI32::new(5);
        assert_eq!(wait_until_equal(&cell, 5, Some(Duration::ZERO)), WaitOutcome::Ok);
        assert_eq!(wait_until_different(&cell, 4, Some(Duration::ZERO)), WaitOutcome::Ok);
    }

    #[test]
    fn test_wait_timeout() {
        let cell = AtomicI32::new(0);
        let start = Instant::now();
        let outcome = wait_until_equal(&cell, 1, Some(Duration::from_millis(50)));
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(elapsed >= Duration::from_millis(40)); // Allow some slack
    }

    #[test]
    fn test_wake_on_store() {
        let cell = Arc::new(AtomicI32::new(0));
        let cell2 = Arc::clone(&cell);

        let handle = thread::spawn(move || {
            wait_until_different(&cell2, 0, Some(Duration::from_secs(10)))
        });

        // Give thread time to block
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        cell.store(7, Ordering::SeqCst);
        notify(&cell);

        assert_eq!(handle.join().unwrap(), WaitOutcome::Ok);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_intermediate_values_keep_waiting() {
        let cell = Arc::new(AtomicI32::new(0));
        let cell2 = Arc::clone(&cell);

        let handle = thread::spawn(move || {
            wait_until_equal(&cell2, 3, Some(Duration::from_secs(10)))
        });

        for v in 1..=3 {
            thread::sleep(Duration::from_millis(10));
            cell.store(v, Ordering::SeqCst);
            notify(&cell);
        }

        assert_eq!(handle.join().unwrap(), WaitOutcome::Ok);
        assert_eq!(cell.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_spurious_wake_rechecks() {
        let cell = AtomicI32::new(0);
        // Notify without a store: the waiter must not report Ok
        notify(&cell);
        let outcome = wait_until_different(&cell, 0, Some(Duration::from_millis(20)));
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }
}
