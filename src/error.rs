//! Typed runtime errors.
//!
//! Saturation failures hand the undelivered [`Event`](crate::event::Event)
//! back to the caller inside the error, so a producer can retry or drop it
//! deliberately.  API misuse (registering after start, subscribing to a
//! reserved tag, capacity overflow at registration) is asserted instead —
//! those are programming errors, not runtime conditions.

use core::fmt;

use crate::event::Event;

// ---------------------------------------------------------------------------
// Delivery errors
// ---------------------------------------------------------------------------

/// A `post` or `publish` that did not deliver.  Every variant carries the
/// event back out; ownership returns to the caller.
#[derive(Debug)]
pub enum DeliveryError {
    /// The receiver's event queue is at capacity.  Nothing was changed:
    /// no reference was taken and no dispatch step was scheduled.
    QueueFull(Event),
    /// The event pool has no free slot.  The delivery never started.
    PoolExhausted(Event),
    /// A publish found no accepting receiver (no subscribers, the
    /// publisher was the only subscriber, or every subscriber's queue was
    /// full).  The event was never referenced; the caller owns it again.
    NoReceivers(Event),
    /// The runtime is shutting down and no longer accepts events.
    Rejected(Event),
}

impl DeliveryError {
    /// Recover the undelivered event.
    pub fn into_event(self) -> Event {
        match self {
            Self::QueueFull(e) | Self::PoolExhausted(e) | Self::NoReceivers(e) | Self::Rejected(e) => e,
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull(_) => write!(f, "receiver event queue full"),
            Self::PoolExhausted(_) => write!(f, "event pool exhausted"),
            Self::NoReceivers(_) => write!(f, "no accepting receivers"),
            Self::Rejected(_) => write!(f, "runtime shutting down"),
        }
    }
}

// ---------------------------------------------------------------------------
// Timer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// All timer slots are occupied.
    TableFull,
    /// A periodic timer needs a non-zero period.
    ZeroPeriod,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableFull => write!(f, "timer table full"),
            Self::ZeroPeriod => write!(f, "periodic timer with zero period"),
        }
    }
}
