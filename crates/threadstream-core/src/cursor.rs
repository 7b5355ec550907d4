//! Cursor values
//!
//! Cursors are stored as raw `i32` in shared memory so both sides can use
//! native atomic waits on them. Negative values are control signals, not
//! offsets. Everything outside the control block works with the decoded
//! [`Cursor`] so sentinels never leak into offset arithmetic.

use crate::error::{ProtocolError, StreamResult};

/// Raw value of `write_index` once the producer will never write again
pub const END_OF_STREAM: i32 = -1;

/// Raw value of `read_index` once the consumer hit a fatal fault
pub const CONSUMER_FAULT: i32 = -2;

/// Decoded cursor value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Byte offset into the channel buffer
    Offset(u32),

    /// No more data will ever be written (or, on the read side,
    /// the consumer acknowledged that)
    EndOfStream,

    /// Consumer detected a fatal protocol violation
    ConsumerFault,
}

impl Cursor {
    /// Decode a raw cell value
    #[inline]
    pub fn from_raw(raw: i32) -> StreamResult<Cursor> {
        match raw {
            END_OF_STREAM => Ok(Cursor::EndOfStream),
            CONSUMER_FAULT => Ok(Cursor::ConsumerFault),
            n if n >= 0 => Ok(Cursor::Offset(n as u32)),
            n => Err(ProtocolError::InvalidCursor(n).into()),
        }
    }

    /// Encode for storing into a cell
    #[inline]
    pub const fn to_raw(self) -> i32 {
        match self {
            Cursor::Offset(n) => n as i32,
            Cursor::EndOfStream => END_OF_STREAM,
            Cursor::ConsumerFault => CONSUMER_FAULT,
        }
    }

    /// Offset, if this is one
    #[inline]
    pub const fn offset(self) -> Option<u32> {
        match self {
            Cursor::Offset(n) => Some(n),
            _ => None,
        }
    }

    /// Sentinel values end the protocol for good
    #[inline]
    pub const fn is_sentinel(self) -> bool {
        !matches!(self, Cursor::Offset(_))
    }
}
