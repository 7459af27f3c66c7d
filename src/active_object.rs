//! Active objects: named, prioritised event handlers.
//!
//! An active object is the unit of concurrency in the runtime.  All of
//! its work happens one event at a time inside
//! [`handle_event`](EventHandler::handle_event); the runtime guarantees
//! no two handlers run concurrently, so handler state needs no locking.
//!
//! ```text
//!   post/publish ──▶ event queue ──▶ run_one() ──▶ handle_event()
//! ```

use alloc::boxed::Box;

use crate::config::{AO_MAX_NAME_LENGTH, AO_MAX_SUBSCRIPTIONS, PRIORITY_MAX};
use crate::event::{Event, EventType};
use crate::queue::EventQueue;
use crate::runtime::Dispatch;

// ───────────────────────────────────────────────────────────────
// Handler trait
// ───────────────────────────────────────────────────────────────

/// What the handler tells the runtime after each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    /// Keep going.
    Running,
    /// Shut the runtime down: stop timers, drain pending events without
    /// handling them, then report [`RuntimeStatus::Shutdown`](crate::RuntimeStatus::Shutdown).
    Shutdown,
}

/// One run-to-completion step.  The event borrow is valid only for the
/// duration of the call; copy out anything needed afterwards.
///
/// Handlers may produce new work through the [`Dispatch`] context —
/// post, publish, start or stop timers — but they cannot recurse into
/// the dispatcher itself.
pub trait EventHandler: Send {
    fn handle_event(&mut self, rt: &dyn Dispatch, event: &Event) -> HandlerStatus;
}

// ───────────────────────────────────────────────────────────────
// Registration
// ───────────────────────────────────────────────────────────────

/// Handle identifying a registered active object.  Obtained from
/// [`Runtime::register`](crate::Runtime::register) and used as the
/// address for `post` and the identity for publisher exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AoId(u8);

impl AoId {
    pub(crate) fn new(index: usize) -> Self {
        AoId(index as u8)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Description of an active object, handed to
/// [`Runtime::register`](crate::Runtime::register).
///
/// ```
/// use evkit::{ActiveObject, Dispatch, Event, EventHandler, EventType, HandlerStatus};
///
/// const EVENT_TYPE_SAMPLE_READY: EventType = EventType::user(0);
///
/// struct AdcReader { readings_seen: u32 }
///
/// impl EventHandler for AdcReader {
///     fn handle_event(&mut self, _rt: &dyn Dispatch, _event: &Event) -> HandlerStatus {
///         self.readings_seen += 1;
///         HandlerStatus::Running
///     }
/// }
///
/// let ao = ActiveObject::new("adc-reader", 3, AdcReader { readings_seen: 0 })
///     .subscribe(EVENT_TYPE_SAMPLE_READY);
/// ```
pub struct ActiveObject {
    pub(crate) name: heapless::String<AO_MAX_NAME_LENGTH>,
    pub(crate) priority: u8,
    pub(crate) subscriptions: heapless::Vec<EventType, AO_MAX_SUBSCRIPTIONS>,
    pub(crate) handler: Box<dyn EventHandler>,
}

impl ActiveObject {
    /// `priority` 0 is the highest and must be below
    /// [`PRIORITY_MAX`](crate::config::PRIORITY_MAX).  Names longer than
    /// [`AO_MAX_NAME_LENGTH`](crate::config::AO_MAX_NAME_LENGTH) are
    /// truncated; the name is for diagnostics only.
    pub fn new(name: &str, priority: u8, handler: impl EventHandler + 'static) -> Self {
        assert!(priority < PRIORITY_MAX, "priority out of range");
        let mut bounded = heapless::String::new();
        for ch in name.chars() {
            if bounded.push(ch).is_err() {
                break;
            }
        }
        Self {
            name: bounded,
            priority,
            subscriptions: heapless::Vec::new(),
            handler: Box::new(handler),
        }
    }

    /// Subscribe to a user event type.  Published events of that type
    /// will be delivered here (unless this object is the publisher).
    /// Reserved framework types cannot be subscribed to; duplicates and
    /// overflow of the subscription list are programming errors.
    pub fn subscribe(mut self, event_type: EventType) -> Self {
        assert!(
            event_type.is_user(),
            "subscriptions must be user event types"
        );
        assert!(
            !self.subscriptions.contains(&event_type),
            "duplicate subscription"
        );
        assert!(
            self.subscriptions.push(event_type).is_ok(),
            "subscription list full"
        );
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }
}

// ───────────────────────────────────────────────────────────────
// Internal registration record
// ───────────────────────────────────────────────────────────────

/// What the runtime keeps per registered active object.
pub(crate) struct AoRecord {
    pub name: heapless::String<AO_MAX_NAME_LENGTH>,
    pub priority: u8,
    pub queue: EventQueue,
    /// Taken out for the duration of a handler invocation so the handler
    /// can run outside the critical section.
    pub handler: Option<Box<dyn EventHandler>>,
}

impl AoRecord {
    pub fn from_parts(ao: ActiveObject) -> Self {
        Self {
            name: ao.name,
            priority: ao.priority,
            queue: EventQueue::new(),
            handler: Some(ao.handler),
        }
    }
}
