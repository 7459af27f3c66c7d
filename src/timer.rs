//! Software timer table.
//!
//! Timers live in fixed slots and, while running, also appear exactly
//! once in the running list, which is kept sorted by ascending deadline
//! (ties keep insertion order).  The runtime arms the platform's single
//! one-shot callback for the head deadline; when it fires, expired
//! timers are popped from the front and turned into timer-finished
//! events for their owners.
//!
//! ```text
//!   timer_start ──▶ running list (sorted by deadline)
//!                        │ head
//!                        ▼
//!               port schedule_callback ──▶ on_scheduled_callback
//!                                               │
//!                                               ▼
//!                                  TimerFinished → owner queue
//! ```

use crate::active_object::AoId;
use crate::config::MAX_TIMERS;
use crate::error::TimerError;
use crate::event::TimerId;

// ───────────────────────────────────────────────────────────────
// Public timer description
// ───────────────────────────────────────────────────────────────

/// A software timer.  When it finishes, `owner` receives an event of
/// type [`EventType::TIMER_FINISHED`](crate::EventType::TIMER_FINISHED)
/// carrying `id`.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    pub owner: AoId,
    /// Echoed in the timer-finished event so the owner can tell its
    /// timers apart.
    pub id: TimerId,
    pub duration_ms: u64,
    /// Periodic timers re-arm themselves at `finish + duration` until
    /// stopped; one-shot timers fire once per start.
    pub periodic: bool,
}

/// Handle to a created timer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u8);

// ───────────────────────────────────────────────────────────────
// Timer table
// ───────────────────────────────────────────────────────────────

struct TimerSlot {
    def: Timer,
    running: bool,
}

pub(crate) struct TimerTable {
    slots: [Option<TimerSlot>; MAX_TIMERS],
    /// `(deadline, slot index)`, sorted by ascending deadline with
    /// insertion-order ties.
    running: heapless::Vec<(u64, u8), MAX_TIMERS>,
}

impl TimerTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            running: heapless::Vec::new(),
        }
    }

    pub fn create(&mut self, def: Timer) -> Result<TimerHandle, TimerError> {
        if def.periodic && def.duration_ms == 0 {
            return Err(TimerError::ZeroPeriod);
        }
        let free = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(TimerError::TableFull)?;
        self.slots[free] = Some(TimerSlot {
            def,
            running: false,
        });
        Ok(TimerHandle(free as u8))
    }

    /// Stop the timer (if running) and free its slot.
    pub fn delete(&mut self, h: TimerHandle) {
        self.stop(h);
        debug_assert!(self.slots[h.0 as usize].is_some(), "delete of unknown timer");
        self.slots[h.0 as usize] = None;
    }

    /// (Re)start the timer with a deadline of `now + duration`.  A
    /// running timer is first removed so it holds exactly one running
    /// list entry.
    pub fn start(&mut self, h: TimerHandle, now: u64) {
        let index = h.0 as usize;
        let Some(slot) = self.slots[index].as_mut() else {
            debug_assert!(false, "start of unknown timer");
            return;
        };
        if slot.running {
            remove_entry(&mut self.running, h.0);
        }
        slot.running = true;
        let deadline = now.saturating_add(slot.def.duration_ms);
        insert_sorted(&mut self.running, deadline, h.0);
    }

    /// No-op when the timer is not running.
    pub fn stop(&mut self, h: TimerHandle) {
        let index = h.0 as usize;
        let Some(slot) = self.slots[index].as_mut() else {
            debug_assert!(false, "stop of unknown timer");
            return;
        };
        if slot.running {
            slot.running = false;
            remove_entry(&mut self.running, h.0);
        }
    }

    pub fn stop_all(&mut self) {
        self.running.clear();
        for slot in self.slots.iter_mut().flatten() {
            slot.running = false;
        }
    }

    /// Deadline the platform callback should currently be armed for.
    pub fn head_deadline(&self) -> Option<u64> {
        self.running.first().map(|&(deadline, _)| deadline)
    }

    /// Pop the head timer if its deadline has passed, re-arming periodic
    /// timers for the next period.  Call repeatedly until `None` to
    /// process every expired timer.
    pub fn pop_expired(&mut self, now: u64) -> Option<(AoId, TimerId)> {
        let &(deadline, index) = self.running.first()?;
        if deadline > now {
            return None;
        }
        self.running.remove(0);

        let slot = self.slots[index as usize].as_mut()?;
        if slot.def.periodic {
            insert_sorted(
                &mut self.running,
                deadline.saturating_add(slot.def.duration_ms),
                index,
            );
        } else {
            slot.running = false;
        }
        Some((slot.def.owner, slot.def.id))
    }

    pub fn is_running(&self, h: TimerHandle) -> bool {
        self.slots[h.0 as usize]
            .as_ref()
            .is_some_and(|slot| slot.running)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }
}

fn insert_sorted(running: &mut heapless::Vec<(u64, u8), MAX_TIMERS>, deadline: u64, index: u8) {
    let at = running.partition_point(|&(d, _)| d <= deadline);
    let pushed = running.insert(at, (deadline, index));
    debug_assert!(pushed.is_ok(), "running timer list overflow");
}

fn remove_entry(running: &mut heapless::Vec<(u64, u8), MAX_TIMERS>, index: u8) {
    if let Some(at) = running.iter().position(|&(_, i)| i == index) {
        running.remove(at);
    }
}
