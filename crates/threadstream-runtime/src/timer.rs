//! Process-wide wake-up timer
//!
//! Single lazily started thread ("ts-timer") that wakes `Waker`s at their
//! deadlines. Cooperative waits arm it as a liveness fallback so a missed
//! notification costs at most one poll interval.
//!
//! # Design
//!
//! The timer thread:
//! 1. Pops every entry whose deadline has passed and wakes it
//! 2. Sleeps on a condvar until the next deadline (or forever if empty)
//! 3. Is woken early when an entry with an earlier deadline is inserted
//!
//! `wake_at` hands back a `WakeHandle`; dropping it removes the entry, so a
//! finished or re-armed wait leaves nothing behind in the heap.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock};
use std::task::Waker;
use std::thread;
use std::time::Instant;

use threadstream_core::{kdebug, kerror};

/// Timer thread name
pub const TIMER_THREAD_NAME: &str = "ts-timer";

/// Wrapper for heap ordering (min-heap by deadline)
struct HeapEntry {
    deadline: Instant,
    seq: u64,
    waker: Waker,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Earliest deadline first, insertion order on ties
        match other.deadline.cmp(&self.deadline) {
            CmpOrdering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

struct TimerInner {
    heap: BinaryHeap<HeapEntry>,
    next_seq: u64,
}

struct Timer {
    inner: Mutex<TimerInner>,
    condvar: Condvar,
}

impl Timer {
    fn lock(&self) -> MutexGuard<'_, TimerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert(&self, deadline: Instant, waker: Waker) -> u64 {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let earliest = inner.heap.peek().map_or(true, |top| deadline < top.deadline);
        inner.heap.push(HeapEntry { deadline, seq, waker });
        drop(inner);

        if earliest {
            self.condvar.notify_one();
        }
        seq
    }

    /// Drop the entry if it has not fired yet. The thread's next sleep is
    /// recomputed on its own; waking it early would gain nothing.
    fn cancel(&self, seq: u64) {
        self.lock().heap.retain(|entry| entry.seq != seq);
    }

    #[cfg(test)]
    fn contains(&self, seq: u64) -> bool {
        self.lock().heap.iter().any(|entry| entry.seq == seq)
    }

    /// Main timer loop
    fn run(&self) {
        let mut inner = self.lock();
        loop {
            let now = Instant::now();
            let mut expired = Vec::new();
            while inner.heap.peek().map_or(false, |top| top.deadline <= now) {
                if let Some(entry) = inner.heap.pop() {
                    expired.push(entry.waker);
                }
            }

            if !expired.is_empty() {
                // Wake outside the lock: a waker may re-arm immediately
                drop(inner);
                for waker in expired {
                    waker.wake();
                }
                inner = self.lock();
                continue;
            }

            inner = match inner.heap.peek().map(|top| top.deadline) {
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(now);
                    self.condvar
                        .wait_timeout(inner, timeout)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
                None => self.condvar.wait(inner).unwrap_or_else(|e| e.into_inner()),
            };
        }
    }
}

static TIMER: OnceLock<Option<&'static Timer>> = OnceLock::new();

fn timer() -> Option<&'static Timer> {
    *TIMER.get_or_init(|| {
        let timer: &'static Timer = Box::leak(Box::new(Timer {
            inner: Mutex::new(TimerInner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            condvar: Condvar::new(),
        }));

        match thread::Builder::new()
            .name(TIMER_THREAD_NAME.into())
            .spawn(move || timer.run())
        {
            Ok(_) => {
                kdebug!("timer thread started");
                Some(timer)
            }
            Err(e) => {
                kerror!("failed to spawn timer thread: {}", e);
                None
            }
        }
    })
}

/// Pending timer wake. Dropping it cancels the wake.
#[must_use = "dropping the handle cancels the wake"]
pub struct WakeHandle {
    entry: Option<(&'static Timer, u64)>,
}

impl WakeHandle {
    /// Whether the wake is still queued
    #[cfg(test)]
    fn is_queued(&self) -> bool {
        self.entry.map_or(false, |(timer, seq)| timer.contains(seq))
    }
}

impl Drop for WakeHandle {
    fn drop(&mut self) {
        if let Some((timer, seq)) = self.entry.take() {
            timer.cancel(seq);
        }
    }
}

/// Wake `waker` once `deadline` has passed, unless the returned handle is
/// dropped first.
///
/// Wakes immediately when the deadline is already due or when the timer
/// thread could not be started; callers re-check their condition either way.
pub fn wake_at(deadline: Instant, waker: Waker) -> WakeHandle {
    if deadline <= Instant::now() {
        waker.wake();
        return WakeHandle { entry: None };
    }

    match timer() {
        Some(timer) => WakeHandle {
            entry: Some((timer, timer.insert(deadline, waker))),
        },
        None => {
            waker.wake();
            WakeHandle { entry: None }
        }
    }
}
