//! Property tests for the runtime's universal invariants: reference
//! count balance, dispatch ordering, per-object FIFO, and failed-post
//! idempotence.
//!
//! Runs on the host against a mock platform port.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::vec::Vec;

use proptest::prelude::*;

use evkit::config::EVENT_QUEUE_LENGTH;
use evkit::{ActiveObject, Event, EventType, Runtime, Timer, TimerId};
use support::{MockPort, Recorder, new_trace, snapshot};

const TYPE_P: EventType = EventType::user(2);

const LABELS: [&str; 4] = ["ao-0", "ao-1", "ao-2", "ao-3"];

fn label_index(label: &str) -> usize {
    LABELS.iter().position(|&l| l == label).unwrap()
}

// ── Dispatch ordering (priority classes + FIFO) ──────────────

proptest! {
    /// With all events posted before dispatch starts, the dispatch
    /// sequence must equal the post sequence stably sorted by priority:
    /// highest priority class first, FIFO within a class, and therefore
    /// FIFO per active object.
    #[test]
    fn dispatch_order_is_a_stable_priority_sort(
        priorities in proptest::collection::vec(0u8..8, 2..=4),
        posts in proptest::collection::vec((0usize..4, 0u32..1000), 1..=40),
    ) {
        let (port, _probe) = MockPort::new();
        let rt = Runtime::new(port);
        let trace = new_trace();

        let mut ids = Vec::new();
        for (i, &priority) in priorities.iter().enumerate() {
            ids.push(rt.register(ActiveObject::new(
                LABELS[i],
                priority,
                Recorder::new(LABELS[i], &trace),
            )));
        }

        let mut accepted: Vec<(usize, u32)> = Vec::new();
        for &(ao, value) in &posts {
            let index = ao % ids.len();
            // Queue-full posts are legitimate drops, not part of the order.
            if rt.post(ids[index], Event::with_payload(TYPE_P, value)).is_ok() {
                accepted.push((index, value));
            }
        }

        while rt.live_events() > 0 {
            rt.run_one();
        }

        let mut expected = accepted;
        expected.sort_by_key(|&(index, _)| priorities[index]);

        let dispatched: Vec<(usize, u32)> = snapshot(&trace)
            .iter()
            .map(|r| (label_index(r.ao), r.value.unwrap()))
            .collect();
        prop_assert_eq!(dispatched, expected);
    }
}

// ── Reference count balance ───────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Post(usize),
    Publish,
    RunOne,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3).prop_map(Op::Post),
        Just(Op::Publish),
        Just(Op::RunOne),
    ]
}

proptest! {
    /// Every event the runtime accepted is destroyed exactly once, no
    /// matter how posts, publishes and dispatch steps interleave.
    #[test]
    fn every_accepted_event_is_freed_exactly_once(
        ops in proptest::collection::vec(arb_op(), 1..=60),
    ) {
        static FREED: AtomicUsize = AtomicUsize::new(0);
        fn count_free(_event: &mut Event) {
            FREED.fetch_add(1, Ordering::Relaxed);
        }
        FREED.store(0, Ordering::Relaxed);

        let (port, _probe) = MockPort::new();
        let rt = Runtime::new(port);
        let trace = new_trace();

        let mut ids = Vec::new();
        for label in &LABELS[..3] {
            ids.push(rt.register(
                ActiveObject::new(label, 4, Recorder::new(label, &trace)).subscribe(TYPE_P),
            ));
        }
        rt.register_event_destructor(TYPE_P, count_free);

        let mut accepted = 0usize;
        for op in &ops {
            match op {
                Op::Post(ao) => {
                    if rt.post(ids[ao % ids.len()], Event::new(TYPE_P)).is_ok() {
                        accepted += 1;
                    }
                }
                Op::Publish => {
                    if rt.publish(None, Event::new(TYPE_P)).is_ok() {
                        accepted += 1;
                    }
                }
                Op::RunOne => {
                    rt.run_one();
                }
            }
        }
        while rt.live_events() > 0 {
            rt.run_one();
        }

        prop_assert_eq!(rt.live_events(), 0, "all slots must be reclaimed");
        prop_assert_eq!(
            FREED.load(Ordering::Relaxed), accepted,
            "one destruction per accepted event"
        );
    }
}

// ── Failed posts are side-effect free ─────────────────────────

proptest! {
    /// A post refused for queue-full leaves the queue contents, the
    /// pool, and the dispatch order exactly as they were.
    #[test]
    fn failed_posts_change_nothing(overflow_attempts in 1usize..=10) {
        let (port, _probe) = MockPort::new();
        let rt = Runtime::new(port);
        let trace = new_trace();

        let a = rt.register(ActiveObject::new(LABELS[0], 3, Recorder::new(LABELS[0], &trace)));
        for i in 0..EVENT_QUEUE_LENGTH as u32 {
            rt.post(a, Event::with_payload(TYPE_P, i)).unwrap();
        }

        for _ in 0..overflow_attempts {
            prop_assert!(rt.post(a, Event::with_payload(TYPE_P, 9999u32)).is_err());
            prop_assert_eq!(rt.live_events(), EVENT_QUEUE_LENGTH);
        }

        while rt.live_events() > 0 {
            rt.run_one();
        }
        let values: Vec<u32> = snapshot(&trace).iter().filter_map(|r| r.value).collect();
        let expected: Vec<u32> = (0..EVENT_QUEUE_LENGTH as u32).collect();
        prop_assert_eq!(values, expected);
    }
}

// ── Timer expiry order ────────────────────────────────────────

proptest! {
    /// Timer-finished events arrive in deadline order, ties broken by
    /// start order, each carrying its own timer's id.
    #[test]
    fn timers_finish_in_deadline_order(
        durations in proptest::collection::vec(1u64..=100, 1..=8),
    ) {
        let (port, probe) = MockPort::new();
        let rt = Runtime::new(port);
        let trace = new_trace();

        let owner = rt.register(ActiveObject::new(
            LABELS[0], 2, Recorder::new(LABELS[0], &trace),
        ));

        for (i, &duration_ms) in durations.iter().enumerate() {
            let handle = rt.timer_create(Timer {
                owner,
                id: TimerId(i as u32),
                duration_ms,
                periodic: false,
            }).unwrap();
            rt.timer_start(handle);
        }

        probe.set_time(101);
        rt.on_scheduled_callback();
        while rt.live_events() > 0 {
            rt.run_one();
        }

        let mut expected: Vec<(u64, u32)> = durations
            .iter()
            .enumerate()
            .map(|(i, &d)| (d, i as u32))
            .collect();
        expected.sort_by_key(|&(d, _)| d);
        let expected_ids: Vec<u32> = expected.into_iter().map(|(_, id)| id).collect();

        let fired_ids: Vec<u32> = snapshot(&trace).iter().filter_map(|r| r.timer).collect();
        prop_assert_eq!(fired_ids, expected_ids);
    }
}
