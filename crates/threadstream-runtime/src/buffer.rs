//! Channel buffer (producer side) and the pending text buffer
//!
//! The channel buffer is not a ring. The producer appends at the write
//! cursor until no further character fits, waits for the consumer to catch
//! up (`read == write`), then rewinds: it stores `write = 0` and waits for
//! the consumer to answer with `read = 0` before copying from the start
//! again. Bytes behind a rewound write cursor are never reused before that
//! answer.

use std::sync::Arc;

use threadstream_core::chunk::fit_prefix;
use threadstream_core::control::CursorSlot;
use threadstream_core::cursor::Cursor;
use threadstream_core::error::{MisuseError, ProtocolError, StreamError, StreamResult};
use threadstream_core::ktrace;

use crate::shared::Shared;

/// Outcome of one copy attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// This many bytes were copied and published
    Copied(usize),
    /// Nothing fits until the consumer drains and the buffer is rewound
    Full,
    /// Rewound, waiting for the consumer to acknowledge with `read = 0`
    Rewinding,
}

/// Producer view of the shared data area
pub struct ChannelBuffer {
    shared: Arc<Shared>,
    /// `write = 0` stored, consumer has not answered yet
    rewinding: bool,
}

impl ChannelBuffer {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            rewinding: false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    #[inline]
    pub fn is_rewinding(&self) -> bool {
        self.rewinding
    }

    /// Current `(write, read)` offsets, validated.
    ///
    /// Fails on the consumer-fault sentinel, on an end-of-stream write cursor
    /// and on the overwritten condition (`read > write` or
    /// `write > capacity`). While a rewind is unanswered everything was
    /// consumed, so the positions are `(0, 0)`.
    pub fn positions(&self) -> StreamResult<(usize, usize)> {
        let control = self.shared.control();
        let write = control.write_cursor()?;
        let read = control.read_cursor()?;

        match (write, read) {
            (_, Cursor::ConsumerFault) => Err(ProtocolError::ConsumerFault.into()),
            (Cursor::EndOfStream, _) => Err(MisuseError::WriteAfterEnd.into()),
            (_, Cursor::EndOfStream) => Err(ProtocolError::InvalidCursor(read.to_raw()).into()),
            (Cursor::Offset(0), Cursor::Offset(_)) if self.rewinding => Ok((0, 0)),
            (Cursor::Offset(w), Cursor::Offset(r)) => {
                let (w, r) = (w as usize, r as usize);
                if r > w || w > self.capacity() {
                    return Err(StreamError::Protocol(ProtocolError::Overwritten {
                        read: r as i32,
                        write: w as i32,
                    }));
                }
                Ok((w, r))
            }
            (Cursor::ConsumerFault, _) => Err(ProtocolError::InvalidCursor(write.to_raw()).into()),
        }
    }

    /// Bytes published but not yet consumed
    #[inline]
    pub fn unconsumed(&self) -> StreamResult<usize> {
        self.positions().map(|(w, r)| w - r)
    }

    /// Consumer has taken everything published
    #[inline]
    pub fn is_drained(&self) -> StreamResult<bool> {
        self.positions().map(|(w, r)| w == r)
    }

    /// Copy the longest char-aligned prefix of `text` that fits behind the
    /// write cursor, publish it and wake the consumer.
    pub fn fill(&mut self, text: &str) -> StreamResult<Fill> {
        if text.is_empty() {
            return Ok(Fill::Copied(0));
        }
        if !self.rewind_acknowledged()? {
            return Ok(Fill::Rewinding);
        }

        let (write, _) = self.positions()?;
        let leftover = self.capacity() - write;
        if leftover == 0 {
            return Ok(Fill::Full);
        }

        let n = fit_prefix(text, leftover);
        if n == 0 {
            // The next character is longer than the tail
            return Ok(Fill::Full);
        }

        // Safety: [write, write + n) is past the published cursor and
        // n <= leftover keeps it within capacity
        unsafe { self.shared.region().write_at(write, &text.as_bytes()[..n]) };
        self.shared
            .publish(CursorSlot::Write, Cursor::Offset((write + n) as u32));

        ktrace!("channel: copied {} bytes at {}", n, write);
        Ok(Fill::Copied(n))
    }

    /// Start a rewind to offset 0. Only valid once drained; the consumer
    /// answers with `read = 0`.
    pub fn rewind(&mut self) -> StreamResult<()> {
        let (write, read) = self.positions()?;
        if write != read {
            return Err(StreamError::Protocol(ProtocolError::Overwritten {
                read: read as i32,
                write: write as i32,
            }));
        }
        if self.rewinding || write == 0 {
            return Ok(());
        }

        self.shared.publish(CursorSlot::Write, Cursor::Offset(0));
        self.rewinding = true;
        ktrace!("channel: rewind at {}", write);
        Ok(())
    }

    /// Whether the consumer answered the last rewind. Clears the pending
    /// rewind once it did.
    pub fn rewind_acknowledged(&mut self) -> StreamResult<bool> {
        if !self.rewinding {
            return Ok(true);
        }
        match self.shared.control().read_cursor()? {
            Cursor::Offset(0) => {
                self.rewinding = false;
                Ok(true)
            }
            Cursor::Offset(_) => Ok(false),
            Cursor::ConsumerFault => Err(ProtocolError::ConsumerFault.into()),
            Cursor::EndOfStream => Err(ProtocolError::InvalidCursor(Cursor::EndOfStream.to_raw()).into()),
        }
    }
}

/// Minimum consumed prefix before compaction is considered
const COMPACT_THRESHOLD: usize = 4096;

/// Text accepted by `write()` but not yet copied into the channel buffer.
///
/// Consumption only advances a head offset; the consumed prefix is dropped
/// when it dominates the allocation.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    buf: String,
    head: usize,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Unconsumed text
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.buf[self.head..]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the first `n` bytes (a char boundary)
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        debug_assert!(self.buf.is_char_boundary(self.head + n));
        self.head += n;

        if self.head == self.buf.len() {
            self.buf.clear();
            self.head = 0;
        } else if self.head >= COMPACT_THRESHOLD && self.head * 2 >= self.buf.len() {
            self.buf.drain(..self.head);
            self.head = 0;
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadstream_core::control::CursorSlot;

    fn channel(capacity: usize) -> (Arc<Shared>, ChannelBuffer) {
        let shared = Shared::new(capacity).unwrap();
        let buffer = ChannelBuffer::new(Arc::clone(&shared));
        (shared, buffer)
    }

    fn consume_all(shared: &Shared) -> String {
        let control = shared.control();
        let w = control.load_raw(CursorSlot::Write) as usize;
        let r = control.load_raw(CursorSlot::Read) as usize;
        let s = unsafe { std::str::from_utf8(shared.region().slice(r, w)).unwrap().to_string() };
        shared.publish(CursorSlot::Read, Cursor::Offset(w as u32));
        s
    }

    #[test]
    fn test_fill_until_full() {
        let (shared, mut buffer) = channel(10);
        assert_eq!(buffer.fill("hello").unwrap(), Fill::Copied(5));
        assert_eq!(buffer.fill(" world\n").unwrap(), Fill::Copied(5));
        assert_eq!(buffer.fill("\n").unwrap(), Fill::Full);
        assert_eq!(buffer.unconsumed().unwrap(), 10);
        assert!(!buffer.is_drained().unwrap());

        assert_eq!(consume_all(&shared), "hello worl");
        assert!(buffer.is_drained().unwrap());
        buffer.rewind().unwrap();
        assert_eq!(buffer.positions().unwrap(), (0, 0));

        shared.publish(CursorSlot::Read, Cursor::Offset(0));
        assert_eq!(buffer.fill("d\n").unwrap(), Fill::Copied(2));
        assert!(!buffer.is_rewinding());
    }

    #[test]
    fn test_tail_too_small_for_char_is_full() {
        let (shared, mut buffer) = channel(15);
        let text = "é".repeat(16);
        assert_eq!(buffer.fill(&text).unwrap(), Fill::Copied(14));
        assert_eq!(buffer.fill(&text[14..]).unwrap(), Fill::Full);
        assert_eq!(consume_all(&shared), "é".repeat(7));
    }

    #[test]
    fn test_rewind_requires_drain() {
        let (_shared, mut buffer) = channel(8);
        buffer.fill("abc").unwrap();
        assert!(buffer.rewind().is_err());
        assert!(!buffer.is_rewinding());
        assert_eq!(buffer.positions().unwrap(), (3, 0));
    }

    #[test]
    fn test_rewind_waits_for_consumer_answer() {
        let (shared, mut buffer) = channel(4);
        assert_eq!(buffer.fill("abcd").unwrap(), Fill::Copied(4));
        consume_all(&shared);
        buffer.rewind().unwrap();
        assert_eq!(shared.control().load_raw(CursorSlot::Write), 0);

        // Read still sits at the old position until the consumer answers
        assert_eq!(shared.control().load_raw(CursorSlot::Read), 4);
        assert_eq!(buffer.fill("ef").unwrap(), Fill::Rewinding);
        assert_eq!(buffer.fill("ef").unwrap(), Fill::Rewinding);
        assert!(!buffer.rewind_acknowledged().unwrap());
        assert_eq!(shared.control().load_raw(CursorSlot::Write), 0);

        shared.publish(CursorSlot::Read, Cursor::Offset(0));
        assert!(buffer.rewind_acknowledged().unwrap());
        assert_eq!(buffer.fill("ef").unwrap(), Fill::Copied(2));
        assert_eq!(consume_all(&shared), "ef");
    }

    #[test]
    fn test_rewind_sees_consumer_fault() {
        let (shared, mut buffer) = channel(4);
        buffer.fill("ab").unwrap();
        consume_all(&shared);
        buffer.rewind().unwrap();
        shared.control().mark_consumer_fault();
        assert_eq!(
            buffer.fill("c"),
            Err(StreamError::Protocol(ProtocolError::ConsumerFault))
        );
    }

    #[test]
    fn test_overwritten_detected() {
        let (shared, mut buffer) = channel(8);
        shared.publish(CursorSlot::Write, Cursor::Offset(2));
        shared.publish(CursorSlot::Read, Cursor::Offset(5));
        assert_eq!(
            buffer.fill("x"),
            Err(StreamError::Protocol(ProtocolError::Overwritten { read: 5, write: 2 }))
        );

        shared.publish(CursorSlot::Read, Cursor::Offset(0));
        shared.publish(CursorSlot::Write, Cursor::Offset(9));
        assert!(matches!(
            buffer.positions(),
            Err(StreamError::Protocol(ProtocolError::Overwritten { .. }))
        ));
    }

    #[test]
    fn test_sentinels() {
        let (shared, buffer) = channel(8);
        shared.control().mark_consumer_fault();
        assert_eq!(
            buffer.positions(),
            Err(StreamError::Protocol(ProtocolError::ConsumerFault))
        );

        let (shared, mut buffer) = channel(8);
        shared.publish(CursorSlot::Write, Cursor::EndOfStream);
        assert_eq!(buffer.fill("x"), Err(StreamError::Misuse(MisuseError::WriteAfterEnd)));
    }

    #[test]
    fn test_pending_consume_and_compact() {
        let mut pending = PendingBuffer::new();
        pending.push("hello ");
        pending.push("wörld");
        assert_eq!(pending.len(), 12);
        pending.consume(6);
        assert_eq!(pending.as_str(), "wörld");
        pending.consume(pending.len());
        assert!(pending.is_empty());

        let big = "x".repeat(COMPACT_THRESHOLD * 2);
        pending.push(&big);
        pending.push("tail");
        pending.consume(COMPACT_THRESHOLD * 2);
        assert_eq!(pending.as_str(), "tail");
        assert_eq!(pending.len(), 4);
    }
}
