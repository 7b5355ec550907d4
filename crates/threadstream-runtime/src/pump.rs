//! Consumer pump
//!
//! Runs on the worker thread. Forwards everything between the read and
//! write cursors to the destination, then releases it by advancing the
//! read cursor.
//!
//! The pump keeps its own position `current` and is the only writer of the
//! read cursor. A write cursor of 0 below `current` is a rewind: the
//! producer saw everything consumed and starts over at the front. The pump
//! answers with `read = 0`, and the producer holds off refilling until it
//! sees that answer, so the write cursor cannot come back to a value the
//! pump is waiting on.

use std::sync::Arc;
use std::time::Duration;

use threadstream_core::control::CursorSlot;
use threadstream_core::cursor::Cursor;
use threadstream_core::error::{ProtocolError, StreamError, StreamResult, WorkerError};
use threadstream_core::state::PumpState;
use threadstream_core::{kdebug, ktrace};

use crate::destination::Destination;
use crate::shared::Shared;
use crate::wait;

/// One iteration's result
enum Step {
    Continue,
    EndOfStream,
}

pub struct Pump {
    shared: Arc<Shared>,
    destination: Box<dyn Destination>,
    current: u32,
    state: PumpState,
    poll_interval: Duration,
}

pub(crate) fn destination_error(e: std::io::Error) -> StreamError {
    StreamError::Worker(WorkerError::Destination(e.to_string()))
}

impl Pump {
    pub fn new(shared: Arc<Shared>, destination: Box<dyn Destination>, poll_interval: Duration) -> Self {
        Self {
            shared,
            destination,
            current: 0,
            state: PumpState::Starting,
            poll_interval,
        }
    }

    #[inline]
    pub fn state(&self) -> PumpState {
        self.state
    }

    /// Forward until end-of-stream, then end the destination and acknowledge
    pub fn run(mut self) -> StreamResult<()> {
        self.state = PumpState::Running;
        kdebug!("pump: running");

        while let Step::Continue = self.step()? {}

        self.state = PumpState::Ending;
        kdebug!("pump: end of stream at {}", self.current);
        self.destination.end().map_err(destination_error)?;

        self.shared.publish(CursorSlot::Read, Cursor::EndOfStream);
        self.state = PumpState::Terminated;
        Ok(())
    }

    fn step(&mut self) -> StreamResult<Step> {
        let control = self.shared.control();

        let write = match control.write_cursor()? {
            Cursor::EndOfStream => return Ok(Step::EndOfStream),
            Cursor::Offset(w) => w,
            other => return Err(ProtocolError::InvalidCursor(other.to_raw()).into()),
        };

        if write == self.current {
            wait::wait_until_different(
                control.cell(CursorSlot::Write),
                write as i32,
                Some(self.poll_interval),
            );
            return Ok(Step::Continue);
        }
        if write < self.current {
            if write != 0 {
                return Err(ProtocolError::InvalidCursor(write as i32).into());
            }
            ktrace!("pump: rewind at {}", self.current);
            self.current = 0;
            self.shared.publish(CursorSlot::Read, Cursor::Offset(0));
            return Ok(Step::Continue);
        }

        self.forward(write)?;
        Ok(Step::Continue)
    }

    /// Hand `[current, write)` to the destination and release it
    fn forward(&mut self, write: u32) -> StreamResult<()> {
        let from = self.current;

        // Safety: published by the write cursor, not yet released
        let bytes = unsafe { self.shared.region().slice(from as usize, write as usize) };
        let chunk = match std::str::from_utf8(bytes) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.shared.control().mark_consumer_fault();
                self.shared.notify(CursorSlot::Read);
                return Err(ProtocolError::InvalidUtf8 {
                    offset: from + e.valid_up_to() as u32,
                }
                .into());
            }
        };

        if !self.destination.write(chunk).map_err(destination_error)? {
            self.destination.wait_drain().map_err(destination_error)?;
        }

        self.shared.publish(CursorSlot::Read, Cursor::Offset(write));
        self.current = write;
        ktrace!("pump: forwarded [{}, {})", from, write);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Collected, CollectDestination};
    use std::io;
    use std::sync::Mutex;
    use std::thread;

    fn produce(shared: &Shared, at: usize, text: &str) {
        unsafe { shared.region().write_at(at, text.as_bytes()) };
        shared.publish(CursorSlot::Write, Cursor::Offset((at + text.len()) as u32));
    }

    fn wait_read(shared: &Shared, value: i32) {
        let outcome = wait::wait_until_equal(
            shared.control().cell(CursorSlot::Read),
            value,
            Some(Duration::from_secs(10)),
        );
        assert!(outcome.is_ok(), "read cursor never reached {}", value);
    }

    fn spawn_pump(shared: &Arc<Shared>, collected: &Collected) -> thread::JoinHandle<StreamResult<()>> {
        let pump = Pump::new(
            Arc::clone(shared),
            Box::new(CollectDestination::new(collected.clone())),
            Duration::from_millis(50),
        );
        assert_eq!(pump.state(), PumpState::Starting);
        thread::spawn(move || pump.run())
    }

    #[test]
    fn test_forward_rewind_and_end() {
        let shared = Shared::new(8).unwrap();
        let collected = Collected::default();
        let handle = spawn_pump(&shared, &collected);

        produce(&shared, 0, "abcd");
        produce(&shared, 4, "efgh");
        wait_read(&shared, 8);

        // Rewind after a confirmed drain; the pump answers before the refill
        shared.publish(CursorSlot::Write, Cursor::Offset(0));
        wait_read(&shared, 0);
        produce(&shared, 0, "ij");
        wait_read(&shared, 2);

        shared.publish(CursorSlot::Write, Cursor::EndOfStream);
        wait_read(&shared, threadstream_core::END_OF_STREAM);

        handle.join().unwrap().unwrap();
        assert_eq!(collected.text(), "abcdefghij");
        assert!(collected.ended());
    }

    #[test]
    fn test_invalid_utf8_faults() {
        let shared = Shared::new(8).unwrap();
        let collected = Collected::default();
        let handle = spawn_pump(&shared, &collected);

        unsafe { shared.region().write_at(0, &[b'o', b'k', 0xff]) };
        shared.publish(CursorSlot::Write, Cursor::Offset(3));

        let result = handle.join().unwrap();
        assert_eq!(
            result,
            Err(StreamError::Protocol(ProtocolError::InvalidUtf8 { offset: 2 }))
        );
        assert_eq!(
            shared.control().load_raw(CursorSlot::Read),
            threadstream_core::CONSUMER_FAULT
        );
        assert!(collected.text().is_empty());
    }

    /// Records where the read cursor stood whenever the pump asked it to drain
    struct CursorRecorder {
        shared: Arc<Shared>,
        seen: Arc<Mutex<Vec<i32>>>,
    }

    impl Destination for CursorRecorder {
        fn write(&mut self, _chunk: &str) -> io::Result<bool> {
            Ok(false)
        }

        fn wait_drain(&mut self) -> io::Result<()> {
            let read = self.shared.control().load_raw(CursorSlot::Read);
            self.seen.lock().unwrap().push(read);
            Ok(())
        }

        fn end(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_chunk_held_until_destination_drains() {
        let shared = Shared::new(8).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pump = Pump::new(
            Arc::clone(&shared),
            Box::new(CursorRecorder {
                shared: Arc::clone(&shared),
                seen: Arc::clone(&seen),
            }),
            Duration::from_millis(50),
        );
        let handle = thread::spawn(move || pump.run());

        produce(&shared, 0, "abcd");
        wait_read(&shared, 4);
        produce(&shared, 4, "ef");
        wait_read(&shared, 6);

        shared.publish(CursorSlot::Write, Cursor::EndOfStream);
        handle.join().unwrap().unwrap();

        // Each drain ran while the chunk's bytes were still unreleased
        assert_eq!(*seen.lock().unwrap(), vec![0, 4]);
    }

    #[test]
    fn test_rewind_below_current_must_be_zero() {
        let shared = Shared::new(8).unwrap();
        let collected = Collected::default();
        let handle = spawn_pump(&shared, &collected);

        produce(&shared, 0, "abcdef");
        wait_read(&shared, 6);
        shared.publish(CursorSlot::Write, Cursor::Offset(3));

        assert_eq!(
            handle.join().unwrap(),
            Err(StreamError::Protocol(ProtocolError::InvalidCursor(3)))
        );
    }
}
