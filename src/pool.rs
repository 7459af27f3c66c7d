//! Fixed-capacity event pool.
//!
//! Every event handed to the runtime lives in one pool slot from the
//! moment it is accepted until its last reference is released.  The slot
//! carries the reference count: one count per receiver queue holding the
//! event.  When the count returns to zero the per-type destructor (if
//! registered) runs exactly once and the slot goes back on the free list.
//!
//! All pool mutation happens inside the runtime critical section, which
//! is what makes allocation safe from ISR producers.

use crate::config::{EVENT_POOL_SIZE, MAX_USER_EVENT_TYPES};
use crate::event::{Event, EventDestructor, EventType};

/// Reference to a pooled event.  One copy lives in each receiver queue
/// the event was delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EventRef(u16);

#[cfg(test)]
impl EventRef {
    pub(crate) fn test_ref(index: u16) -> Self {
        EventRef(index)
    }
}

struct Slot {
    /// `None` while the slot is free, and transiently while the event is
    /// checked out for a handler invocation.
    event: Option<Event>,
    ref_count: u16,
}

pub(crate) struct EventPool {
    slots: [Slot; EVENT_POOL_SIZE],
    free: heapless::Vec<u16, EVENT_POOL_SIZE>,
    destructors: [Option<EventDestructor>; MAX_USER_EVENT_TYPES],
}

impl EventPool {
    pub fn new() -> Self {
        let mut free = heapless::Vec::new();
        for i in (0..EVENT_POOL_SIZE as u16).rev() {
            let _ = free.push(i);
        }
        Self {
            slots: core::array::from_fn(|_| Slot {
                event: None,
                ref_count: 0,
            }),
            free,
            destructors: [None; MAX_USER_EVENT_TYPES],
        }
    }

    /// At most one destructor per user type; re-registration replaces.
    pub fn set_destructor(&mut self, type_index: usize, destructor: EventDestructor) {
        self.destructors[type_index] = Some(destructor);
    }

    /// Move an event into a free slot with a reference count of zero.
    /// Gives the event back when the pool is exhausted.
    pub fn alloc(&mut self, event: Event) -> Result<EventRef, Event> {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.event = Some(event);
                slot.ref_count = 0;
                Ok(EventRef(index))
            }
            None => Err(event),
        }
    }

    /// One more queue holds this event.
    pub fn retain(&mut self, r: EventRef) {
        let slot = &mut self.slots[r.0 as usize];
        debug_assert!(slot.event.is_some());
        slot.ref_count += 1;
    }

    /// One queue is done with this event.  Dropping the count to zero
    /// runs the registered destructor and frees the slot.
    pub fn release(&mut self, r: EventRef) {
        let slot = &mut self.slots[r.0 as usize];
        debug_assert!(slot.ref_count > 0, "release of unreferenced event");
        slot.ref_count -= 1;
        if slot.ref_count == 0 {
            if let Some(mut event) = slot.event.take() {
                if let Some(dtor) = event
                    .event_type()
                    .user_index()
                    .and_then(|i| self.destructors[i])
                {
                    dtor(&mut event);
                }
            }
            let _ = self.free.push(r.0);
        }
    }

    /// Take the event out for a handler invocation.  The reference count
    /// is untouched; the caller must [`checkin`](Self::checkin) before
    /// releasing.
    pub fn checkout(&mut self, r: EventRef) -> Option<Event> {
        self.slots[r.0 as usize].event.take()
    }

    pub fn checkin(&mut self, r: EventRef, event: Event) {
        let slot = &mut self.slots[r.0 as usize];
        debug_assert!(slot.event.is_none());
        slot.event = Some(event);
    }

    /// Free a slot whose event was never delivered anywhere, returning
    /// the event to the producer.  No destructor runs: ownership goes
    /// back out and the caller's own cleanup applies.
    pub fn reclaim_unreferenced(&mut self, r: EventRef) -> Event {
        let slot = &mut self.slots[r.0 as usize];
        debug_assert!(slot.ref_count == 0, "reclaim of referenced event");
        let event = slot.event.take();
        let _ = self.free.push(r.0);
        match event {
            Some(event) => event,
            None => {
                debug_assert!(false, "reclaim of an empty slot");
                Event::new(EventType::NULL)
            }
        }
    }

    /// Number of slots currently occupied.
    pub fn live(&self) -> usize {
        EVENT_POOL_SIZE - self.free.len()
    }
}
