//! EvKit — a cooperative, priority-scheduled active-object event runtime
//! for embedded systems.
//!
//! Independent *active objects* communicate only by asynchronous events:
//! direct point-to-point posts or publish/subscribe fan-out.  A single
//! event instance is reference-counted so it can be delivered to many
//! receivers and reclaimed exactly once.  Dispatch is run-to-completion,
//! one event per step, highest priority first with FIFO among equals.
//! Software timers feed timer-finished events into their owners' queues
//! through the platform's single one-shot callback.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Producers                              │
//! │                                                              │
//! │  ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌─────────┐   │
//! │  │ ISR      │   │ other AO  │   │ thread   │   │ timers  │   │
//! │  └────┬─────┘   └─────┬─────┘   └────┬─────┘   └────┬────┘   │
//! │       │   post/publish│               │              │        │
//! │       ▼               ▼               ▼              ▼        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │   event pool · per-AO queues · priority ticket queue   │  │
//! │  │            (one nestable critical section)             │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          │ run_one()                         │
//! │                          ▼                                   │
//! │            handler(&mut self, &dyn Dispatch, &Event)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The main loop is the application's:
//!
//! ```ignore
//! let rt = Runtime::new(port);
//! let blinker = rt.register(ActiveObject::new("blinker", 1, Blinker::new()));
//! loop {
//!     if rt.run_one() == RuntimeStatus::Shutdown {
//!         break;
//!     }
//!     critical_section::with(|cs| {
//!         if !rt.has_work(cs) {
//!             // e.g. WFI on bare metal
//!         }
//!     });
//! }
//! ```

#![no_std]
#![deny(unused_must_use)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod config;

mod active_object;
mod error;
mod event;
mod pool;
mod port;
mod queue;
mod runtime;
mod sched;
mod timer;

pub use active_object::{ActiveObject, AoId, EventHandler, HandlerStatus};
pub use error::{DeliveryError, TimerError};
pub use event::{Event, EventDestructor, EventType, TimerId};
pub use port::TimerPort;
pub use runtime::{Dispatch, Runtime, RuntimeStatus};
pub use timer::{Timer, TimerHandle};
