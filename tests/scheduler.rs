//! Time slicing, priorities and preemption of render passes.
//!
//! Every `Slow` component advances the manual clock while it renders, so a
//! sliced pass yields after a couple of them.
//!
//! Run with: cargo test --test scheduler

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use spark_fiber::scheduler::{Clock, TaskCallback, TaskHandle};
use spark_fiber::*;

// =============================================================================
// HELPERS
// =============================================================================

const COST_MS: f64 = 3.0;

fn slow_item(clock: ManualClock) -> Component {
    Component::new("Slow", move |_hooks, props| {
        clock.advance(COST_MS);
        let value = props.int("value").unwrap_or_default();
        Ok(host("i", Props::new().with_children(value)).into())
    })
}

fn slow_row(item: &Component, count: i64, value: i64) -> Node {
    let items: Vec<Node> = (0..count)
        .map(|i| item.element(Props::new().with("value", value).with("i", i)).into())
        .collect();
    host("row", Props::new().with_children(items)).into()
}

fn row_markup(count: usize, value: i64) -> String {
    format!("<row>{}</row>", format!("<i>{value}</i>").repeat(count))
}

fn any_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Immediate),
        Just(Priority::UserBlocking),
        Just(Priority::Normal),
        Just(Priority::Low),
        Just(Priority::Idle),
    ]
}

// =============================================================================
// TESTS
// =============================================================================

#[test]
fn test_default_lane_render_yields_between_slices() {
    let clock = ManualClock::new();
    let scheduler = Scheduler::with_clock(clock.clone());
    let noop = NoopHost::new();
    let root = create_root_with_config(
        noop.clone(),
        noop.container(),
        &scheduler,
        RootConfig::new().with_render_lane(Lanes::DEFAULT),
    );
    let item = slow_item(clock);

    root.render(slow_row(&item, 6, 1));
    assert!(scheduler.run_turn());
    assert_eq!(noop.markup(), "", "first slice ran out before the row finished");
    assert!(root.pending_lanes().contains(Lanes::DEFAULT));
    assert!(scheduler.has_pending_work());

    root.flush().unwrap();
    assert_eq!(noop.markup(), row_markup(6, 1));
    assert_eq!(root.commit_count(), 1);
}

#[test]
fn test_sync_render_ignores_slice_budget() {
    let clock = ManualClock::new();
    let scheduler = Scheduler::with_clock(clock.clone());
    let noop = NoopHost::new();
    let root = create_root(noop.clone(), noop.container(), &scheduler);
    let item = slow_item(clock);

    root.render(slow_row(&item, 6, 1));
    assert!(scheduler.run_microtasks() >= 1);
    assert_eq!(noop.markup(), row_markup(6, 1));
}

#[test]
fn test_urgent_update_preempts_transition() {
    let clock = ManualClock::new();
    let scheduler = Scheduler::with_clock(clock.clone());
    let noop = NoopHost::new();
    let root = create_root(noop.clone(), noop.container(), &scheduler);
    let item = slow_item(clock);

    let committed: Rc<RefCell<Vec<(i64, i64)>>> = Rc::default();
    let setters: Rc<RefCell<Option<(Dispatch<i64>, Dispatch<i64>)>>> = Rc::default();
    let record = committed.clone();
    let publish = setters.clone();
    let app = Component::new("App", move |hooks, _props| {
        let (fast, set_fast) = hooks.use_state(|| 0i64)?;
        let (slow, set_slow) = hooks.use_state(|| 0i64)?;
        *publish.borrow_mut() = Some((set_fast, set_slow));

        let record = record.clone();
        hooks.use_effect(
            move || {
                record.borrow_mut().push((fast, slow));
                None
            },
            None,
        )?;
        Ok(fragment(vec![Node::from(fast), slow_row(&item, 5, slow)]).into())
    });

    root.render(app.element(Props::new()));
    root.flush().unwrap();
    let (set_fast, set_slow) = setters.borrow().clone().expect("rendered");

    scheduler.start_transition(|| set_slow.set(1));
    assert!(scheduler.run_turn());
    assert_eq!(root.commit_count(), 1, "transition pass yielded mid-tree");

    // default-lane update while the transition pass is half done
    set_fast.set(1);
    root.flush().unwrap();

    assert_eq!(*committed.borrow(), vec![(0, 0), (1, 0), (1, 1)]);
    assert_eq!(noop.markup(), format!("1{}", row_markup(5, 1)));
    assert_eq!(root.pending_lanes(), Lanes::empty());
}

#[test]
fn test_transition_updates_batch_with_each_other() {
    let scheduler = Scheduler::with_clock(ManualClock::new());
    let noop = NoopHost::new();
    let root = create_root(noop.clone(), noop.container(), &scheduler);

    let slot: Rc<RefCell<Option<Dispatch<i64>>>> = Rc::default();
    let publish = slot.clone();
    let app = Component::new("App", move |hooks, _props| {
        let (value, set_value) = hooks.use_state(|| 0i64)?;
        *publish.borrow_mut() = Some(set_value);
        Ok(Node::from(value.to_string()))
    });

    root.render(app.element(Props::new()));
    root.flush().unwrap();
    let set = slot.borrow().clone().expect("rendered");

    scheduler.start_transition(|| {
        set.update(|n| n + 1);
        set.update(|n| n * 10);
    });
    assert!(root.pending_lanes().contains(Lanes::TRANSITION));
    root.flush().unwrap();

    assert_eq!(noop.markup(), "10");
    assert_eq!(root.commit_count(), 2);
}

// =============================================================================
// TASK ORDERING
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_tasks_run_by_deadline_and_never_early(
        specs in prop::collection::vec((any_priority(), prop::option::of(0u32..40)), 1..24),
    ) {
        let clock = ManualClock::new();
        let scheduler = Scheduler::with_clock(clock.clone());
        let ran: Rc<RefCell<Vec<(usize, f64)>>> = Rc::default();

        let handles: Vec<TaskHandle> = specs
            .iter()
            .enumerate()
            .map(|(index, (priority, delay))| {
                let ran = ran.clone();
                let clock = clock.clone();
                let callback = TaskCallback::new(move |_did_timeout| {
                    ran.borrow_mut().push((index, clock.now()));
                    None
                });
                scheduler.add_task_with_delay(*priority, callback, delay.map(f64::from))
            })
            .collect();
        scheduler.flush();

        let ran = ran.borrow();
        prop_assert_eq!(ran.len(), specs.len());
        for &(index, now) in ran.iter() {
            prop_assert!(now >= handles[index].start_time());
        }
        // tasks that ran at the same instant were all ready together
        for pair in ran.windows(2) {
            let ((a, a_at), (b, b_at)) = (pair[0], pair[1]);
            if a_at == b_at {
                let first = (handles[a].deadline(), handles[a].id());
                let second = (handles[b].deadline(), handles[b].id());
                prop_assert!(first <= second, "{first:?} ran before {second:?}");
            } else {
                prop_assert!(a_at < b_at);
            }
        }
    }
}
