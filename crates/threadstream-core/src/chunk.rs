//! Character-boundary-safe chunking
//!
//! The producer copies pending text into whatever space is left in the
//! channel buffer. A chunk must never end in the middle of a multi-byte
//! character, or the consumer would decode a truncated sequence.

/// Byte length of the longest prefix of `pending` to copy into `leftover`
/// bytes of free space.
///
/// Starts from `leftover` characters and halves the candidate until its
/// encoded length fits. Returns 0 when not even the next character fits,
/// which the caller treats like a full buffer. With a capacity of at least
/// four bytes that can only happen at the tail of the buffer, never right
/// after a rewind.
pub fn fit_prefix(pending: &str, leftover: usize) -> usize {
    if leftover >= pending.len() {
        return pending.len();
    }

    let mut chars = leftover;
    loop {
        let end = byte_len_of_chars(pending, chars);
        if end <= leftover {
            return end;
        }
        chars /= 2;
    }
}

/// Encoded length of the first `chars` characters
#[inline]
fn byte_len_of_chars(s: &str, chars: usize) -> usize {
    s.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len())
}
