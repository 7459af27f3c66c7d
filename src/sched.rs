//! Priority scheduling queue.
//!
//! Each successful event enqueue produces one *ticket*: a pending
//! run-to-completion step for a specific active object.  Tickets are kept
//! ordered by ascending priority value — priority 0 (the highest) at the
//! front — with FIFO ordering among equal priorities.  An active object
//! appears once per pending event in its queue.

use crate::active_object::AoId;
use crate::config::SCHED_QUEUE_CAPACITY;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Ticket {
    pub ao: AoId,
    pub priority: u8,
}

pub(crate) struct SchedQueue {
    tickets: heapless::Vec<Ticket, SCHED_QUEUE_CAPACITY>,
}

impl SchedQueue {
    pub fn new() -> Self {
        Self {
            tickets: heapless::Vec::new(),
        }
    }

    /// Insert after every ticket of the same or higher priority and
    /// before the first strictly lower-priority one.
    ///
    /// Cannot overflow: tickets are 1:1 with event queue entries and the
    /// capacity is the sum of all event queue capacities.
    pub fn insert(&mut self, ao: AoId, priority: u8) {
        let at = self.tickets.partition_point(|t| t.priority <= priority);
        let pushed = self.tickets.insert(at, Ticket { ao, priority });
        debug_assert!(pushed.is_ok(), "scheduling queue overflow");
    }

    pub fn pop(&mut self) -> Option<Ticket> {
        if self.tickets.is_empty() {
            None
        } else {
            Some(self.tickets.remove(0))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }
}
