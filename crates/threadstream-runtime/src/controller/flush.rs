//! Cooperative flush

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use threadstream_core::control::CursorSlot;
use threadstream_core::error::StreamResult;

use super::ThreadStream;
use crate::shared::CursorWatch;
use crate::wait::{CooperativeWait, Predicate};

/// Future returned by `ThreadStream::flush`.
///
/// Each poll dispatches worker messages and copies what fits, then sleeps
/// until the read cursor moves or a worker message arrives. It never waits
/// on the thread: a deferred `end()` is left to `poll_events` or
/// `wait_closed`.
pub struct Flush<'a> {
    stream: &'a mut ThreadStream,
    /// Wait on the read cursor, keyed by the value it waits to change from
    wait: Option<(i32, CooperativeWait<CursorWatch>)>,
}

impl<'a> Flush<'a> {
    pub(super) fn new(stream: &'a mut ThreadStream) -> Self {
        Self { stream, wait: None }
    }
}

impl Future for Flush<'_> {
    type Output = StreamResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            let stream = &mut *this.stream;

            // Registered first so a message posted from here on wakes us
            stream.shared.to_producer.register(cx.waker());
            let read = stream.shared.control().load_raw(CursorSlot::Read);

            stream.poll_progress();
            if let Err(e) = stream.check_live() {
                return Poll::Ready(Err(e));
            }
            if stream.finished {
                return Poll::Ready(Ok(()));
            }
            if stream.ready && !stream.flushing && stream.pending.is_empty() {
                match stream.buffer.is_drained() {
                    Ok(true) => return Poll::Ready(Ok(())),
                    Ok(false) => {}
                    Err(e) => return Poll::Ready(Err(stream.fail(e))),
                }
            }

            if this.wait.as_ref().map_or(false, |(from, _)| *from != read) {
                this.wait = None;
            }
            let (_, wait) = this.wait.get_or_insert_with(|| {
                let watch = stream.shared.watch(CursorSlot::Read);
                let wait = CooperativeWait::new(
                    watch,
                    Predicate::Different(read),
                    None,
                    stream.config.poll_interval,
                );
                (read, wait)
            });

            match Pin::new(wait).poll(cx) {
                Poll::Ready(_) => {
                    this.wait = None;
                }
                Poll::Pending => {
                    if stream.shared.to_producer.is_empty() {
                        return Poll::Pending;
                    }
                }
            }
        }
    }
}
