//! Shared test doubles: a mock platform port with a settable clock and
//! recorded callback arming, plus recording event handlers.

#![allow(dead_code)] // Each integration test binary uses a subset.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use evkit::{Dispatch, Event, EventHandler, HandlerStatus, TimerPort};

// ── Mock platform port ────────────────────────────────────────

/// What the runtime asked the port to do, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOp {
    Schedule(u64),
    Cancel,
}

/// Shared handle onto a [`MockPort`]: drive the clock, inspect arming.
#[derive(Clone, Default)]
pub struct PortProbe {
    clock: Arc<AtomicU64>,
    ops: Arc<Mutex<Vec<PortOp>>>,
    armed: Arc<Mutex<Option<u64>>>,
}

impl PortProbe {
    pub fn set_time(&self, ms: u64) {
        self.clock.store(ms, Ordering::Relaxed);
    }

    pub fn advance(&self, ms: u64) {
        self.clock.fetch_add(ms, Ordering::Relaxed);
    }

    /// Deadline the one-shot callback is currently armed for.
    pub fn armed(&self) -> Option<u64> {
        *self.armed.lock().unwrap()
    }

    /// Full schedule/cancel history.
    pub fn ops(&self) -> Vec<PortOp> {
        self.ops.lock().unwrap().clone()
    }
}

pub struct MockPort {
    probe: PortProbe,
}

impl MockPort {
    pub fn new() -> (Self, PortProbe) {
        let probe = PortProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl TimerPort for MockPort {
    fn now_ms(&mut self) -> u64 {
        self.probe.clock.load(Ordering::Relaxed)
    }

    fn schedule_callback(&mut self, deadline_ms: u64) {
        self.probe.ops.lock().unwrap().push(PortOp::Schedule(deadline_ms));
        *self.probe.armed.lock().unwrap() = Some(deadline_ms);
    }

    fn cancel_callback(&mut self) {
        self.probe.ops.lock().unwrap().push(PortOp::Cancel);
        *self.probe.armed.lock().unwrap() = None;
    }
}

// ── Recording handlers ────────────────────────────────────────

/// One handled event as seen by a [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub ao: &'static str,
    pub tag: i32,
    /// `u32` payload, when the event carries one.
    pub value: Option<u32>,
    /// Finished timer id, for timer-finished events.
    pub timer: Option<u32>,
}

pub type Trace = Arc<Mutex<Vec<Received>>>;

pub fn new_trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot(trace: &Trace) -> Vec<Received> {
    trace.lock().unwrap().clone()
}

/// Handler that appends every event it sees to a shared trace.
pub struct Recorder {
    label: &'static str,
    trace: Trace,
}

impl Recorder {
    pub fn new(label: &'static str, trace: &Trace) -> Self {
        Self {
            label,
            trace: trace.clone(),
        }
    }
}

impl EventHandler for Recorder {
    fn handle_event(&mut self, _rt: &dyn Dispatch, event: &Event) -> HandlerStatus {
        self.trace.lock().unwrap().push(Received {
            ao: self.label,
            tag: event.event_type().raw(),
            value: event.payload::<u32>().copied(),
            timer: event.timer_id().map(|t| t.0),
        });
        HandlerStatus::Running
    }
}

/// Handler built from a closure, for scenario-specific behaviour.
pub struct FnHandler<F>(pub F);

impl<F> EventHandler for FnHandler<F>
where
    F: FnMut(&dyn Dispatch, &Event) -> HandlerStatus + Send,
{
    fn handle_event(&mut self, rt: &dyn Dispatch, event: &Event) -> HandlerStatus {
        (self.0)(rt, event)
    }
}
