//! Per-active-object event queue.
//!
//! A bounded FIFO of event references.  Producers push under the runtime
//! critical section; the dispatcher pops one entry per run-to-completion
//! step.  A full queue refuses the push with no side effect — the caller
//! decides whether that drops the event or fails the post.

use heapless::Deque;

use crate::config::EVENT_QUEUE_LENGTH;
use crate::pool::EventRef;

pub(crate) struct EventQueue {
    entries: Deque<EventRef, EVENT_QUEUE_LENGTH>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    /// `false` when the queue is at capacity; the queue is unchanged.
    pub fn push_back(&mut self, r: EventRef) -> bool {
        self.entries.push_back(r).is_ok()
    }

    pub fn pop_front(&mut self) -> Option<EventRef> {
        self.entries.pop_front()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
