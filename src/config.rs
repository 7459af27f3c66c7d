//! Compile-time capacity tunables.
//!
//! Every table in the runtime is statically sized so that no allocation
//! happens on the hot path and worst-case memory use is known at link
//! time.  Applications that need different limits adjust these constants
//! and rebuild.

/// Maximum number of active objects that can be registered.
pub const MAX_ACTIVE_OBJECTS: usize = 32;

/// Number of user-defined event types.  User tags occupy
/// `[0, MAX_USER_EVENT_TYPES)`; negative tags are reserved for the
/// framework.
pub const MAX_USER_EVENT_TYPES: usize = 32;

/// Capacity of each active object's event queue.
pub const EVENT_QUEUE_LENGTH: usize = 16;

/// Maximum stored length of an active object's debug name.
/// Longer names are truncated on registration.
pub const AO_MAX_NAME_LENGTH: usize = 32;

/// Maximum number of event types one active object may subscribe to.
pub const AO_MAX_SUBSCRIPTIONS: usize = 32;

/// Exclusive upper bound for active object priorities.  Priority 0 is
/// the highest; `PRIORITY_MAX - 1` the lowest.
pub const PRIORITY_MAX: u8 = 32;

/// Number of slots in the event pool.  Every in-flight event occupies
/// one slot from enqueue until its last reference is released.
pub const EVENT_POOL_SIZE: usize = 64;

/// Number of slots in the software timer table.
pub const MAX_TIMERS: usize = 16;

/// Capacity of the priority scheduling queue.  One ticket exists per
/// queued event, so the bound is the sum of all event queue capacities.
pub const SCHED_QUEUE_CAPACITY: usize = MAX_ACTIVE_OBJECTS * EVENT_QUEUE_LENGTH;
