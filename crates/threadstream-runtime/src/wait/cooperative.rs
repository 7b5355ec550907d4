//! Cooperative wait: a `Future` that resolves when a cell satisfies a
//! predicate.
//!
//! Never blocks the thread. Each poll:
//! 1. Checks the predicate
//! 2. Registers the task waker with the cell's watcher
//! 3. Re-checks (a store between 1 and 2 would otherwise be missed)
//! 4. Arms a timer wake at `min(deadline, now + poll_interval)`
//!
//! Notifications from the peer normally wake the task well before the
//! timer; the timer only bounds the cost of a lost one. Re-arming or
//! dropping the wait cancels the previous timer entry.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI32, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use super::WaitOutcome;
use crate::timer::{self, WakeHandle};

/// Condition a waiter is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Cell equals the value
    Equal(i32),
    /// Cell differs from the value
    Different(i32),
}

impl Predicate {
    #[inline]
    pub fn holds(self, value: i32) -> bool {
        match self {
            Predicate::Equal(v) => value == v,
            Predicate::Different(v) => value != v,
        }
    }
}

/// A cell plus the means to be told when it changes
pub trait Watch {
    /// The cell being watched
    fn cell(&self) -> &AtomicI32;

    /// Arrange for `waker` to be woken on the next notify of the cell
    fn register(&self, waker: &Waker);
}

/// Future returned by cooperative waits
pub struct CooperativeWait<W: Watch> {
    watch: W,
    predicate: Predicate,
    deadline: Option<Instant>,
    poll_interval: Duration,
    /// Timer wake already armed, and for which waker
    armed: Option<(Instant, Waker, WakeHandle)>,
}

impl<W: Watch> CooperativeWait<W> {
    /// Wait for `predicate` on `watch`, giving up after `timeout` (None = never)
    pub fn new(
        watch: W,
        predicate: Predicate,
        timeout: Option<Duration>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            watch,
            predicate,
            deadline: timeout.map(|t| Instant::now() + t),
            poll_interval,
            armed: None,
        }
    }

    #[inline]
    fn satisfied(&self) -> bool {
        self.predicate.holds(self.watch.cell().load(Ordering::SeqCst))
    }

    fn arm_timer(&mut self, now: Instant, waker: &Waker) {
        if let Some((at, armed_waker, _)) = &self.armed {
            if *at > now && armed_waker.will_wake(waker) {
                return;
            }
        }

        let mut at = now + self.poll_interval;
        if let Some(deadline) = self.deadline {
            at = at.min(deadline);
        }
        // Replacing the old handle cancels its entry
        let handle = timer::wake_at(at, waker.clone());
        self.armed = Some((at, waker.clone(), handle));
    }
}

impl<W: Watch + Unpin> Future for CooperativeWait<W> {
    type Output = WaitOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<WaitOutcome> {
        let this = self.get_mut();

        if this.satisfied() {
            return Poll::Ready(WaitOutcome::Ok);
        }

        let now = Instant::now();
        if this.deadline.map_or(false, |d| now >= d) {
            return Poll::Ready(WaitOutcome::TimedOut);
        }

        this.watch.register(cx.waker());
        if this.satisfied() {
            return Poll::Ready(WaitOutcome::Ok);
        }

        this.arm_timer(now, cx.waker());
        Poll::Pending
    }
}
