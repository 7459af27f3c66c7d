//! The runtime: event delivery, priority scheduling, lifecycle.
//!
//! All shared state — registered active objects, subscription table,
//! event pool, scheduling queue, timer table, the platform port — lives
//! behind one `critical_section::Mutex`, so producers in ISRs or other
//! threads and the dispatch loop serialise on the same critical section.
//! Handlers run *outside* the critical section: the dispatcher takes the
//! handler and the event out under the lock, invokes the handler
//! unlocked, then puts everything back and releases the event reference.
//!
//! ```text
//! ┌─────────────┐  post/publish   ┌───────────────────────────┐
//! │ ISR         │───────────────▶│  event pool (ref-counted)  │
//! │ other AO    │                 │  per-AO queues · tickets   │
//! │ timer fire  │                 └────────────┬───────────────┘
//! └─────────────┘                              │ run_one()
//!                                              ▼
//!                                   handler (unlocked, RTC)
//! ```

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};
use log::{debug, info, warn};

use crate::active_object::{ActiveObject, AoId, AoRecord, EventHandler, HandlerStatus};
use crate::config::{MAX_ACTIVE_OBJECTS, MAX_USER_EVENT_TYPES};
use crate::error::{DeliveryError, TimerError};
use crate::event::{Event, EventDestructor, EventType};
use crate::pool::{EventPool, EventRef};
use crate::port::TimerPort;
use crate::sched::SchedQueue;
use crate::timer::{Timer, TimerHandle, TimerTable};

use alloc::boxed::Box;

// ───────────────────────────────────────────────────────────────
// Public surface
// ───────────────────────────────────────────────────────────────

/// What [`Runtime::run_one`] reports back to the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    /// Keep calling `run_one`.
    Running,
    /// The runtime has shut down and drained; stop the loop.
    Shutdown,
}

/// The operations a handler may perform while handling an event.
///
/// Handlers receive `&dyn Dispatch` so they can produce follow-up work
/// without knowing the concrete platform port type.  Applications can
/// call the same methods directly on [`Runtime`].
pub trait Dispatch {
    /// Deliver an event directly to one active object.  See
    /// [`Runtime::post`].
    fn post(&self, receiver: AoId, event: Event) -> Result<(), DeliveryError>;

    /// Broadcast an event to every subscriber of its type except the
    /// publisher.  See [`Runtime::publish`].
    fn publish(&self, publisher: Option<AoId>, event: Event) -> Result<u32, DeliveryError>;

    fn timer_create(&self, def: Timer) -> Result<TimerHandle, TimerError>;
    fn timer_start(&self, timer: TimerHandle);
    fn timer_stop(&self, timer: TimerHandle);
    fn timer_delete(&self, timer: TimerHandle);

    /// The platform's monotonic millisecond clock.
    fn now_ms(&self) -> u64;

    /// Begin shutdown: equivalent to a handler returning
    /// [`HandlerStatus::Shutdown`].
    fn request_shutdown(&self);
}

// ───────────────────────────────────────────────────────────────
// Runtime state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// Registration window; events are accepted but not yet dispatched.
    Setup,
    Running,
    /// Draining: pending event references are released without invoking
    /// handlers, new events are rejected.
    Shutdown,
}

struct Inner<P: TimerPort> {
    state: RunState,
    port: P,
    pool: EventPool,
    aos: heapless::Vec<AoRecord, MAX_ACTIVE_OBJECTS>,
    subscribers: [heapless::Vec<AoId, MAX_ACTIVE_OBJECTS>; MAX_USER_EVENT_TYPES],
    sched: SchedQueue,
    timers: TimerTable,
}

impl<P: TimerPort> Inner<P> {
    /// Queue push + reference count + scheduling ticket, as one unit.
    /// `false` (queue full) leaves everything untouched.
    fn deliver(&mut self, receiver: AoId, evt_ref: EventRef) -> bool {
        let rec = &mut self.aos[receiver.index()];
        if rec.queue.push_back(evt_ref) {
            let priority = rec.priority;
            self.pool.retain(evt_ref);
            self.sched.insert(receiver, priority);
            true
        } else {
            false
        }
    }

    fn begin_shutdown(&mut self) {
        if self.state == RunState::Shutdown {
            return;
        }
        self.state = RunState::Shutdown;
        self.timers.stop_all();
        self.port.cancel_callback();
        info!("shutdown requested, {} pending step(s) to drain", self.sched.len());
    }

    /// Re-arm the platform callback when a timer operation moved the
    /// head of the running list.
    fn rearm_if_changed(&mut self, before: Option<u64>) {
        let after = self.timers.head_deadline();
        if after == before {
            return;
        }
        match after {
            Some(deadline) => {
                debug!("timer callback armed for t={deadline}");
                self.port.schedule_callback(deadline);
            }
            None => self.port.cancel_callback(),
        }
    }
}

/// One dispatch step, extracted under the critical section and acted on
/// outside it.
enum Step {
    Idle,
    Drained,
    ShutdownComplete,
    Dispatch {
        ao: AoId,
        evt_ref: EventRef,
        event: Event,
        handler: Box<dyn EventHandler>,
    },
}

// ───────────────────────────────────────────────────────────────
// Runtime
// ───────────────────────────────────────────────────────────────

/// The event runtime.  One instance owns every active object, queue,
/// timer and in-flight event.
///
/// All methods take `&self`; interior state is guarded by the
/// `critical-section` implementation the application links, which makes
/// the producer-side API (`post`, `publish`, timer operations,
/// [`on_scheduled_callback`](Self::on_scheduled_callback)) callable
/// from ISRs and other threads.  `run_one` itself must be driven from
/// exactly one context — the application's main loop.
pub struct Runtime<P: TimerPort> {
    inner: Mutex<RefCell<Inner<P>>>,
}

impl<P: TimerPort> Runtime<P> {
    /// A freshly initialised runtime in its registration window.
    pub fn new(port: P) -> Self {
        info!("event runtime initialised");
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                state: RunState::Setup,
                port,
                pool: EventPool::new(),
                aos: heapless::Vec::new(),
                subscribers: core::array::from_fn(|_| heapless::Vec::new()),
                sched: SchedQueue::new(),
                timers: TimerTable::new(),
            })),
        }
    }

    // ── Registration ──────────────────────────────────────────

    /// Register an active object and install its subscriptions.
    ///
    /// Legal only before the first [`run_one`](Self::run_one) call.
    /// The returned [`AoId`] is the object's address for [`post`](Self::post)
    /// and its identity for publisher exclusion.
    ///
    /// # Panics
    ///
    /// When called after dispatch has started, or when the active object
    /// table or a per-type subscriber list is full.
    pub fn register(&self, ao: ActiveObject) -> AoId {
        // Validated outside the critical section; registration happens
        // from a single context during setup.
        let (state, count, subs_have_room) = critical_section::with(|cs| {
            let inner = self.inner.borrow(cs).borrow();
            let subs_have_room = ao.subscriptions.iter().all(|t| {
                t.user_index()
                    .is_none_or(|i| inner.subscribers[i].len() < MAX_ACTIVE_OBJECTS)
            });
            (inner.state, inner.aos.len(), subs_have_room)
        });
        assert!(
            state == RunState::Setup,
            "registration after dispatch started"
        );
        assert!(count < MAX_ACTIVE_OBJECTS, "active object table full");
        assert!(subs_have_room, "subscriber list full");

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            let id = AoId::new(inner.aos.len());
            for &event_type in &ao.subscriptions {
                // Reserved tags are rejected at subscribe() time.
                if let Some(index) = event_type.user_index() {
                    let _ = inner.subscribers[index].push(id);
                }
            }
            info!(
                "registered '{}' (priority {}, {} subscription(s))",
                ao.name.as_str(),
                ao.priority,
                ao.subscriptions.len()
            );
            let _ = inner.aos.push(AoRecord::from_parts(ao));
            id
        })
    }

    /// Associate a cleanup hook with a user event type, replacing any
    /// previous one.  The hook runs exactly once per event, after the
    /// last receiver finishes with it and before its slot is recycled.
    ///
    /// # Panics
    ///
    /// On a reserved event type, or when called after dispatch started.
    pub fn register_event_destructor(&self, event_type: EventType, destructor: EventDestructor) {
        let Some(index) = event_type.user_index() else {
            panic!("destructor for reserved event type");
        };
        let state = critical_section::with(|cs| self.inner.borrow(cs).borrow().state);
        assert!(
            state == RunState::Setup,
            "destructor registration after dispatch started"
        );
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .borrow_mut()
                .pool
                .set_destructor(index, destructor);
        });
    }

    // ── Event delivery ────────────────────────────────────────

    /// Deliver an event directly to `receiver`.
    ///
    /// On success the runtime owns the event: the receiver's queue holds
    /// a reference and a dispatch step is scheduled.  On failure nothing
    /// changed and the error hands the event back.
    ///
    /// Callable from ISRs and other threads.
    ///
    /// # Panics
    ///
    /// When the event's type is not a user type.
    pub fn post(&self, receiver: AoId, event: Event) -> Result<(), DeliveryError> {
        assert!(
            event.event_type().is_user(),
            "post requires a user event type"
        );
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if inner.state == RunState::Shutdown {
                return Err(DeliveryError::Rejected(event));
            }
            if inner.aos[receiver.index()].queue.is_full() {
                return Err(DeliveryError::QueueFull(event));
            }
            let evt_ref = match inner.pool.alloc(event) {
                Ok(r) => r,
                Err(event) => return Err(DeliveryError::PoolExhausted(event)),
            };
            let accepted = inner.deliver(receiver, evt_ref);
            debug_assert!(accepted, "queue filled with nothing else running");
            Ok(())
        })
    }

    /// Broadcast an event to every subscriber of its type, excluding
    /// `publisher` when given.
    ///
    /// Receivers whose queues are full are skipped — the rest still get
    /// the event — and each skip is logged.  Returns the number of
    /// receivers that accepted the event.  When *no* receiver accepted
    /// it (nobody subscribed, the publisher was the only subscriber, or
    /// every queue was full), ownership returns to the caller via
    /// [`DeliveryError::NoReceivers`]; the event was never shared and no
    /// destructor runs.
    ///
    /// Callable from ISRs and other threads.
    ///
    /// # Panics
    ///
    /// When the event's type is not a user type.
    pub fn publish(&self, publisher: Option<AoId>, event: Event) -> Result<u32, DeliveryError> {
        let Some(type_index) = event.event_type().user_index() else {
            panic!("publish requires a user event type");
        };

        // Snapshot the receiver set and claim a pool slot.
        let (evt_ref, receivers) = critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if inner.state == RunState::Shutdown {
                return Err(DeliveryError::Rejected(event));
            }
            let mut receivers: heapless::Vec<AoId, MAX_ACTIVE_OBJECTS> = heapless::Vec::new();
            for &id in &inner.subscribers[type_index] {
                if Some(id) != publisher {
                    let _ = receivers.push(id);
                }
            }
            if receivers.is_empty() {
                return Err(DeliveryError::NoReceivers(event));
            }
            let evt_ref = match inner.pool.alloc(event) {
                Ok(r) => r,
                Err(event) => return Err(DeliveryError::PoolExhausted(event)),
            };
            Ok((evt_ref, receivers))
        })?;

        // Each delivery takes its own critical section; interrupts may
        // run between them.
        let mut delivered = 0u32;
        for receiver in &receivers {
            let accepted = critical_section::with(|cs| {
                let mut inner = self.inner.borrow(cs).borrow_mut();
                if inner.state != RunState::Shutdown && inner.deliver(*receiver, evt_ref) {
                    true
                } else {
                    warn!(
                        "publish: '{}' did not accept the event, skipped",
                        inner.aos[receiver.index()].name.as_str()
                    );
                    false
                }
            });
            if accepted {
                delivered += 1;
            }
        }

        if delivered == 0 {
            let event = critical_section::with(|cs| {
                self.inner
                    .borrow(cs)
                    .borrow_mut()
                    .pool
                    .reclaim_unreferenced(evt_ref)
            });
            Err(DeliveryError::NoReceivers(event))
        } else {
            Ok(delivered)
        }
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Execute at most one run-to-completion step: pop the
    /// highest-priority ticket, dequeue one event from that active
    /// object, run its handler, release the event reference.
    ///
    /// The first call moves the runtime out of its registration window.
    /// After shutdown begins, each call releases one pending event
    /// without invoking a handler until everything is drained, then
    /// reports [`RuntimeStatus::Shutdown`].
    ///
    /// Must be called from a single context; handlers must not recurse
    /// into it.
    pub fn run_one(&self) -> RuntimeStatus {
        let step = critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if inner.state == RunState::Setup {
                inner.state = RunState::Running;
                info!("dispatch started");
            }
            let draining = inner.state == RunState::Shutdown;

            let Some(ticket) = inner.sched.pop() else {
                return if draining {
                    Step::ShutdownComplete
                } else {
                    Step::Idle
                };
            };

            // Tickets are created 1:1 with queue entries.
            let popped = inner.aos[ticket.ao.index()].queue.pop_front();
            let Some(evt_ref) = popped else {
                debug_assert!(false, "ticket without a queued event");
                return Step::Drained;
            };

            if draining {
                inner.pool.release(evt_ref);
                return Step::Drained;
            }

            let handler = inner.aos[ticket.ao.index()].handler.take();
            let event = inner.pool.checkout(evt_ref);
            match (handler, event) {
                (Some(handler), Some(event)) => Step::Dispatch {
                    ao: ticket.ao,
                    evt_ref,
                    event,
                    handler,
                },
                (handler, event) => {
                    debug_assert!(false, "re-entrant dispatch");
                    if let Some(event) = event {
                        inner.pool.checkin(evt_ref, event);
                    }
                    if let Some(handler) = handler {
                        inner.aos[ticket.ao.index()].handler = Some(handler);
                    }
                    inner.pool.release(evt_ref);
                    Step::Drained
                }
            }
        });

        match step {
            Step::Idle | Step::Drained => RuntimeStatus::Running,
            Step::ShutdownComplete => RuntimeStatus::Shutdown,
            Step::Dispatch {
                ao,
                evt_ref,
                event,
                mut handler,
            } => {
                // The handler runs with interrupts/producers live.
                let status = handler.handle_event(self, &event);

                critical_section::with(|cs| {
                    let mut inner = self.inner.borrow(cs).borrow_mut();
                    inner.aos[ao.index()].handler = Some(handler);
                    inner.pool.checkin(evt_ref, event);
                    inner.pool.release(evt_ref);
                    if status == HandlerStatus::Shutdown {
                        inner.begin_shutdown();
                    }
                });
                RuntimeStatus::Running
            }
        }
    }

    /// True while dispatch steps are pending.  Takes the critical
    /// section token so applications can check-and-sleep atomically:
    ///
    /// ```ignore
    /// critical_section::with(|cs| {
    ///     if !rt.has_work(cs) {
    ///         enter_low_power_wait();  // woken by the next interrupt
    ///     }
    /// });
    /// ```
    pub fn has_work(&self, cs: CriticalSection<'_>) -> bool {
        !self.inner.borrow(cs).borrow().sched.is_empty()
    }

    /// Begin shutdown from outside a handler.  Safe to call repeatedly.
    pub fn request_shutdown(&self) {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().begin_shutdown());
    }

    // ── Timers ────────────────────────────────────────────────

    /// Claim a timer slot.  The timer is created stopped; arm it with
    /// [`timer_start`](Self::timer_start).
    ///
    /// # Panics
    ///
    /// When `def.owner` is not a registered active object.
    pub fn timer_create(&self, def: Timer) -> Result<TimerHandle, TimerError> {
        assert!(
            def.owner.index() < self.registered_count(),
            "timer owner not registered"
        );
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().timers.create(def))
    }

    /// Start, or restart from now, a created timer.  The platform
    /// callback is re-armed when this timer becomes the next to finish.
    /// Ignored during shutdown.
    pub fn timer_start(&self, timer: TimerHandle) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if inner.state == RunState::Shutdown {
                debug!("timer_start ignored during shutdown");
                return;
            }
            let before = inner.timers.head_deadline();
            let now = inner.port.now_ms();
            inner.timers.start(timer, now);
            inner.rearm_if_changed(before);
        });
    }

    /// Stop a timer; no-op if it is not running.  The platform callback
    /// is re-armed (or cancelled) when this was the next to finish.
    pub fn timer_stop(&self, timer: TimerHandle) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            let before = inner.timers.head_deadline();
            inner.timers.stop(timer);
            inner.rearm_if_changed(before);
        });
    }

    /// Stop a timer and free its slot.
    pub fn timer_delete(&self, timer: TimerHandle) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            let before = inner.timers.head_deadline();
            inner.timers.delete(timer);
            inner.rearm_if_changed(before);
        });
    }

    /// Entry point for the platform's one-shot callback.
    ///
    /// Pops every timer whose deadline has passed, posts a
    /// timer-finished event to each owner, re-inserts periodic timers,
    /// then re-arms the callback for the new head (or cancels it).
    /// Pool exhaustion or a full owner queue drops that firing — later
    /// timers still fire.
    ///
    /// Callable from whatever context the platform invokes its callback
    /// in, ISR included.
    pub fn on_scheduled_callback(&self) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if inner.state == RunState::Shutdown {
                inner.port.cancel_callback();
                return;
            }
            let now = inner.port.now_ms();
            while let Some((owner, id)) = inner.timers.pop_expired(now) {
                let evt_ref = match inner.pool.alloc(Event::timer_finished(id)) {
                    Ok(r) => r,
                    Err(_) => {
                        warn!("timer {}: event pool exhausted, firing dropped", id.0);
                        continue;
                    }
                };
                if inner.deliver(owner, evt_ref) {
                    debug!("timer {} finished at t={now}", id.0);
                } else {
                    let _ = inner.pool.reclaim_unreferenced(evt_ref);
                    warn!("timer {}: owner queue full, firing dropped", id.0);
                }
            }
        });

        // Re-arm for the new head outside the expiry critical section.
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if inner.state == RunState::Shutdown {
                return;
            }
            match inner.timers.head_deadline() {
                Some(deadline) => inner.port.schedule_callback(deadline),
                None => inner.port.cancel_callback(),
            }
        });
    }

    // ── Introspection ─────────────────────────────────────────

    /// The platform's monotonic clock.
    pub fn now_ms(&self) -> u64 {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().port.now_ms())
    }

    /// Events currently held by the runtime (queued or being handled).
    pub fn live_events(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().pool.live())
    }

    pub fn registered_count(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().aos.len())
    }

    /// Events waiting in one active object's queue.
    pub fn queued_count(&self, ao: AoId) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().aos[ao.index()].queue.len())
    }

    pub fn running_timer_count(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().timers.running_count())
    }

    pub fn timer_is_running(&self, timer: TimerHandle) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().timers.is_running(timer))
    }
}

impl<P: TimerPort> Dispatch for Runtime<P> {
    fn post(&self, receiver: AoId, event: Event) -> Result<(), DeliveryError> {
        Runtime::post(self, receiver, event)
    }

    fn publish(&self, publisher: Option<AoId>, event: Event) -> Result<u32, DeliveryError> {
        Runtime::publish(self, publisher, event)
    }

    fn timer_create(&self, def: Timer) -> Result<TimerHandle, TimerError> {
        Runtime::timer_create(self, def)
    }

    fn timer_start(&self, timer: TimerHandle) {
        Runtime::timer_start(self, timer);
    }

    fn timer_stop(&self, timer: TimerHandle) {
        Runtime::timer_stop(self, timer);
    }

    fn timer_delete(&self, timer: TimerHandle) {
        Runtime::timer_delete(self, timer);
    }

    fn now_ms(&self) -> u64 {
        Runtime::now_ms(self)
    }

    fn request_shutdown(&self) {
        Runtime::request_shutdown(self);
    }
}
