//! Platform port — the boundary between the runtime and the target.
//!
//! The runtime needs three things from its environment: a monotonic
//! millisecond clock, a single-slot one-shot callback for timer expiry,
//! and a nestable critical section.  The first two come in through the
//! [`TimerPort`] trait, implemented per target (hardware compare
//! channel, RTOS timer, host thread in tests).  The critical section
//! comes from the `critical-section` crate: the application links the
//! implementation matching its execution environment — interrupt
//! masking on bare metal, a kernel primitive on an RTOS, the `std`
//! implementation in host tests.

/// Time source and one-shot wakeup, implemented by the platform.
///
/// The callback side is wired by the application: whatever mechanism
/// `schedule_callback` arms must end up calling
/// [`Runtime::on_scheduled_callback`](crate::Runtime::on_scheduled_callback),
/// and must be able to do so from the same context `schedule_callback`
/// is called from (ISR or thread).
pub trait TimerPort: Send {
    /// Milliseconds elapsed on a monotonic counter.  Wall-clock
    /// adjustments (e.g. an NTP sync) must not affect it.
    fn now_ms(&mut self) -> u64;

    /// Arm the one-shot callback for `deadline_ms` on the same counter
    /// as [`now_ms`](Self::now_ms).  Replaces any previously armed
    /// deadline; only one callback is ever pending.
    fn schedule_callback(&mut self, deadline_ms: u64);

    /// Disarm the pending callback.  Idempotent; a no-op when nothing
    /// is armed.
    fn cancel_callback(&mut self);
}
