//! Controller and pump state types

use core::fmt;

/// State of the producer-side stream controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControllerState {
    /// Constructed, worker not spawned yet
    Created = 0,

    /// Worker thread spawned, destination not ready yet
    Spawning = 1,

    /// Worker ready, nothing in flight
    Ready = 2,

    /// Synchronous transfer of pending data in progress
    Writing = 3,

    /// Asynchronous drain cycle owns the channel buffer
    Flushing = 4,

    /// Waiting for the consumer to catch up with the write cursor
    Draining = 5,

    /// End-of-stream handshake in progress
    Ending = 6,

    /// Consumer acknowledged end-of-stream
    Ended = 7,

    /// Worker exited after a clean end
    Closed = 8,

    /// Fatal error, every further call fails
    Destroyed = 9,
}

impl ControllerState {
    /// Check if `write()` is accepted in this state
    #[inline]
    pub const fn accepts_writes(&self) -> bool {
        !matches!(
            self,
            ControllerState::Ending
                | ControllerState::Ended
                | ControllerState::Closed
                | ControllerState::Destroyed
        )
    }

    /// Check if the worker has reported ready at some point
    #[inline]
    pub const fn is_ready(&self) -> bool {
        !matches!(
            self,
            ControllerState::Created | ControllerState::Spawning | ControllerState::Destroyed
        )
    }

    /// Check if no further transition can happen except to `Destroyed`/`Closed`
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ControllerState::Closed | ControllerState::Destroyed)
    }
}

impl From<u8> for ControllerState {
    fn from(v: u8) -> Self {
        match v {
            0 => ControllerState::Created,
            1 => ControllerState::Spawning,
            2 => ControllerState::Ready,
            3 => ControllerState::Writing,
            4 => ControllerState::Flushing,
            5 => ControllerState::Draining,
            6 => ControllerState::Ending,
            7 => ControllerState::Ended,
            8 => ControllerState::Closed,
            _ => ControllerState::Destroyed, // Default for invalid values
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Created => "created",
            ControllerState::Spawning => "spawning",
            ControllerState::Ready => "ready",
            ControllerState::Writing => "writing",
            ControllerState::Flushing => "flushing",
            ControllerState::Draining => "draining",
            ControllerState::Ending => "ending",
            ControllerState::Ended => "ended",
            ControllerState::Closed => "closed",
            ControllerState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// State of the consumer pump on the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PumpState {
    /// Destination being created
    Starting = 0,

    /// Moving bytes from the channel buffer to the destination
    Running = 1,

    /// End-of-stream seen, destination finishing
    Ending = 2,

    /// Loop exited
    Terminated = 3,
}

impl PumpState {
    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, PumpState::Terminated)
    }
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpState::Starting => write!(f, "starting"),
            PumpState::Running => write!(f, "running"),
            PumpState::Ending => write!(f, "ending"),
            PumpState::Terminated => write!(f, "terminated"),
        }
    }
}
