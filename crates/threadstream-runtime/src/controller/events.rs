//! Stream events and observer registry

use threadstream_core::error::StreamError;

use crate::message::SideMessage;

/// Kinds of events a stream emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Drain,
    Finish,
    Message,
    Error,
    Close,
}

impl EventKind {
    const COUNT: usize = 6;

    #[inline]
    fn index(self) -> usize {
        match self {
            EventKind::Ready => 0,
            EventKind::Drain => 1,
            EventKind::Finish => 2,
            EventKind::Message => 3,
            EventKind::Error => 4,
            EventKind::Close => 5,
        }
    }
}

/// A state transition observed by the producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Destination constructed, writes reach the worker
    Ready,
    /// Buffered data was fully handed to the destination after a `false` write
    Drain,
    /// Consumer acknowledged end-of-stream
    Finish,
    /// Application message from the worker
    Message(SideMessage),
    /// Stream destroyed; emitted once
    Error(StreamError),
    /// Worker thread exited
    Close,
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Ready => EventKind::Ready,
            StreamEvent::Drain => EventKind::Drain,
            StreamEvent::Finish => EventKind::Finish,
            StreamEvent::Message(_) => EventKind::Message,
            StreamEvent::Error(_) => EventKind::Error,
            StreamEvent::Close => EventKind::Close,
        }
    }
}

/// Event callback
pub type Observer = Box<dyn FnMut(&StreamEvent) + Send>;

/// Fixed set of observer lists, one per event kind
#[derive(Default)]
pub struct Observers {
    slots: [Vec<Observer>; EventKind::COUNT],
}

impl Observers {
    pub fn register(&mut self, kind: EventKind, observer: Observer) {
        self.slots[kind.index()].push(observer);
    }

    pub fn emit(&mut self, event: &StreamEvent) {
        for observer in self.slots[event.kind().index()].iter_mut() {
            observer(event);
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.slots[kind.index()].len()
    }
}
