//! Event objects: a type tag plus an optional typed payload.
//!
//! Producers build an [`Event`], hand ownership to the runtime via
//! `post`/`publish`, and the runtime delivers a shared borrow of it to
//! each receiving handler.  The tag discriminates; the payload rides
//! out-of-band as `dyn Any`, downcast by the handler that knows the
//! concrete type:
//!
//! ```
//! use evkit::{Event, EventType};
//!
//! struct AdcReading { channel: u8, millivolts: u16 }
//!
//! const EVENT_TYPE_ADC_READING: EventType = EventType::user(0);
//!
//! let event = Event::with_payload(EVENT_TYPE_ADC_READING, AdcReading {
//!     channel: 1,
//!     millivolts: 3300,
//! });
//! let reading = event.payload::<AdcReading>().unwrap();
//! assert_eq!(reading.millivolts, 3300);
//! ```

use core::any::Any;
use core::fmt;

use alloc::boxed::Box;

use crate::config::MAX_USER_EVENT_TYPES;

// ── Event type tags ───────────────────────────────────────────

/// Discriminant tag carried by every event.
///
/// Negative values are reserved for the framework; user-defined tags are
/// sequential starting at 0 and bounded by
/// [`MAX_USER_EVENT_TYPES`](crate::config::MAX_USER_EVENT_TYPES).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventType(i32);

impl EventType {
    /// Reserved: list terminator tag.  Never carried by a live event.
    pub const NULL: EventType = EventType(-3);
    /// Reserved: shutdown notification.
    pub const SHUTDOWN_PENDING: EventType = EventType(-2);
    /// Reserved: a software timer owned by the receiver finished.
    pub const TIMER_FINISHED: EventType = EventType(-1);

    /// A user-defined tag.  `tag` must lie in `[0, MAX_USER_EVENT_TYPES)`.
    pub const fn user(tag: i32) -> Self {
        assert!(tag >= 0 && (tag as usize) < MAX_USER_EVENT_TYPES);
        EventType(tag)
    }

    /// The raw signed tag value.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// True for tags in the user-defined range.
    pub const fn is_user(self) -> bool {
        self.0 >= 0 && (self.0 as usize) < MAX_USER_EVENT_TYPES
    }

    /// Index into per-user-type tables, or `None` for reserved tags.
    pub(crate) fn user_index(self) -> Option<usize> {
        if self.is_user() { Some(self.0 as usize) } else { None }
    }
}

/// Identifier echoed in a timer-finished event so the owner can tell its
/// timers apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(pub u32);

// ── Event ─────────────────────────────────────────────────────

/// Cleanup hook invoked exactly once, right before a fully-released
/// event's storage is recycled.  Registered per user event type via
/// [`Runtime::register_event_destructor`](crate::Runtime::register_event_destructor).
pub type EventDestructor = fn(&mut Event);

pub(crate) enum Payload {
    None,
    TimerFinished(TimerId),
    User(Box<dyn Any + Send>),
}

/// A single event instance.
///
/// The runtime reference-counts delivered events internally; handlers only
/// ever see `&Event`, valid for the duration of the handler call.
pub struct Event {
    event_type: EventType,
    payload: Payload,
}

impl Event {
    /// An event with no payload; the tag alone is the message.
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            payload: Payload::None,
        }
    }

    /// An event carrying a typed payload, retrieved by receivers with
    /// [`payload`](Self::payload).
    pub fn with_payload<T: Any + Send>(event_type: EventType, payload: T) -> Self {
        Self {
            event_type,
            payload: Payload::User(Box::new(payload)),
        }
    }

    pub(crate) fn timer_finished(id: TimerId) -> Self {
        Self {
            event_type: EventType::TIMER_FINISHED,
            payload: Payload::TimerFinished(id),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Re-tag the event.  Must happen before the event is handed to the
    /// runtime; the tag drives subscription fan-out and destructor lookup.
    pub fn set_type(&mut self, event_type: EventType) {
        self.event_type = event_type;
    }

    /// Downcast the user payload.  `None` if the event has no payload or
    /// the payload is of a different type.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        match &self.payload {
            Payload::User(any) => any.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Mutable payload access, mainly for destructors.
    pub fn payload_mut<T: Any>(&mut self) -> Option<&mut T> {
        match &mut self.payload {
            Payload::User(any) => any.downcast_mut::<T>(),
            _ => None,
        }
    }

    /// The finished timer's id, for [`EventType::TIMER_FINISHED`] events.
    pub fn timer_id(&self) -> Option<TimerId> {
        match self.payload {
            Payload::TimerFinished(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = match self.payload {
            Payload::None => "none",
            Payload::TimerFinished(_) => "timer-finished",
            Payload::User(_) => "user",
        };
        f.debug_struct("Event")
            .field("type", &self.event_type.raw())
            .field("payload", &payload)
            .finish()
    }
}
