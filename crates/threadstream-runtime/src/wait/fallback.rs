//! Fallback atomic wait using std::sync::Condvar
//!
//! Used on platforms without futex support. One process-wide mutex and
//! condvar serve every cell: a wake on any cell wakes every waiter, and each
//! waiter re-checks its own cell. Less efficient but portable.

use super::AtomicWait;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

static LOCK: Mutex<()> = Mutex::new(());
static CONDVAR: Condvar = Condvar::new();

/// Condvar-based wait (fallback)
pub struct CondvarWait;

impl AtomicWait for CondvarWait {
    fn wait(cell: &AtomicI32, current: i32, timeout: Option<Duration>) {
        let guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());

        // Checked under the lock: a waker stores before taking it, so the
        // store is either visible here or its notify comes after we sleep.
        if cell.load(Ordering::SeqCst) != current {
            return;
        }

        match timeout {
            Some(t) => {
                let _ = CONDVAR.wait_timeout(guard, t);
            }
            None => {
                let _ = CONDVAR.wait(guard);
            }
        }
    }

    fn wake_all(_cell: &AtomicI32) {
        let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
        CONDVAR.notify_all();
    }
}
