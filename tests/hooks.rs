//! Hook behavior through full render and commit passes.
//!
//! Run with: cargo test --test hooks

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_fiber::*;

// =============================================================================
// HELPERS
// =============================================================================

fn setup() -> (NoopHost, Root<NoopHost>, Scheduler) {
    let scheduler = Scheduler::with_clock(ManualClock::new());
    let noop = NoopHost::new();
    let root = create_root(noop.clone(), noop.container(), &scheduler);
    (noop, root, scheduler)
}

/// Shared slot a component publishes its setter into.
type Setter<S> = Rc<RefCell<Option<Dispatch<S>>>>;

fn setter_of<S: Clone + PartialEq + 'static>(slot: &Setter<S>) -> Dispatch<S> {
    slot.borrow().clone().expect("component rendered")
}

type Log = Rc<RefCell<Vec<String>>>;

fn counter(slot: Setter<i32>, renders: Rc<Cell<usize>>) -> Component {
    Component::new("Counter", move |hooks, _props| {
        renders.set(renders.get() + 1);
        let (count, set_count) = hooks.use_state(|| 0i32)?;
        *slot.borrow_mut() = Some(set_count);
        Ok(host("button", Props::new().with_children(count)).into())
    })
}

// =============================================================================
// STATE
// =============================================================================

#[test]
fn test_updates_in_one_tick_batch_into_one_commit() {
    let (noop, root, _scheduler) = setup();
    let slot: Setter<i32> = Rc::default();
    let renders = Rc::new(Cell::new(0));
    root.render(counter(slot.clone(), renders.clone()).element(Props::new()));
    root.flush().unwrap();
    let commits = root.commit_count();

    let set = setter_of(&slot);
    for _ in 0..3 {
        set.update(|n| n + 1);
    }
    root.flush().unwrap();

    assert_eq!(noop.markup(), "<button>3</button>");
    assert_eq!(root.commit_count(), commits + 1);
    assert_eq!(renders.get(), 2);
}

#[test]
fn test_updates_across_commits_reach_both_generations() {
    let (noop, root, _scheduler) = setup();
    let slot: Setter<i32> = Rc::default();
    let renders = Rc::new(Cell::new(0));
    root.render(counter(slot.clone(), renders).element(Props::new()));
    root.flush().unwrap();

    // each commit swaps which generation is current; the setter must find
    // the fiber regardless of which copy it was handed out from
    for expected in 1..=4 {
        setter_of(&slot).update(|n| n + 1);
        root.flush().unwrap();
        assert_eq!(noop.markup(), format!("<button>{expected}</button>"));
    }
    assert_eq!(root.pending_lanes(), Lanes::empty());
}

#[test]
fn test_setting_same_value_skips_render() {
    let (_noop, root, _scheduler) = setup();
    let slot: Setter<i32> = Rc::default();
    let renders = Rc::new(Cell::new(0));
    root.render(counter(slot.clone(), renders.clone()).element(Props::new()));
    root.flush().unwrap();
    let commits = root.commit_count();

    setter_of(&slot).set(0);
    root.flush().unwrap();

    assert_eq!(renders.get(), 1);
    assert_eq!(root.commit_count(), commits);
}

#[test]
fn test_urgent_update_lands_before_default_one() {
    let (noop, root, scheduler) = setup();
    let slot: Setter<i32> = Rc::default();
    let renders = Rc::new(Cell::new(0));
    root.render(counter(slot.clone(), renders).element(Props::new()));
    root.flush().unwrap();

    let set = setter_of(&slot);
    set.update(|n| n + 10);
    scheduler.run_with_priority(Priority::Immediate, || set.update(|n| n * 2));

    // the sync lane renders on the microtask with the default update skipped
    scheduler.run_microtasks();
    assert_eq!(noop.markup(), "<button>0</button>");

    // the default pass replays both in dispatch order
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<button>20</button>");
}

#[test]
fn test_low_and_idle_priority_updates_still_render() {
    let (noop, root, scheduler) = setup();
    let slot: Setter<i32> = Rc::default();
    let renders = Rc::new(Cell::new(0));
    root.render(counter(slot.clone(), renders).element(Props::new()));
    root.flush().unwrap();
    let commits = root.commit_count();

    let set = setter_of(&slot);
    scheduler.run_with_priority(Priority::Low, || set.set(5));
    assert!(root.pending_lanes().contains(Lanes::IDLE));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<button>5</button>");
    assert_eq!(root.commit_count(), commits + 1);

    scheduler.run_with_priority(Priority::Idle, || set.update(|n| n + 1));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<button>6</button>");
    assert_eq!(root.pending_lanes(), Lanes::empty());
}

#[test]
fn test_hook_count_change_is_an_error() {
    let (noop, root, _scheduler) = setup();
    let shifty = Component::new("Shifty", |hooks, props| {
        let (a, _) = hooks.use_state(|| 1i32)?;
        if props.bool("extra").unwrap_or(false) {
            hooks.use_state(|| 2i32)?;
        }
        Ok(Node::from(a))
    });

    root.render(shifty.element(Props::new()));
    root.flush().unwrap();

    root.render(shifty.element(Props::new().with("extra", true)));
    let err = root.flush().unwrap_err();
    assert_eq!(err, FiberError::HookCountMismatch { expected: 1, found: 2 });
    assert_eq!(noop.markup(), "1");
}

#[test]
fn test_hook_kind_change_is_an_error() {
    let (_noop, root, _scheduler) = setup();
    let shifty = Component::new("Shifty", |hooks, props| {
        if props.bool("swap").unwrap_or(false) {
            hooks.use_ref(|| 0u8)?;
        } else {
            hooks.use_state(|| 0u8)?;
        }
        Ok(Node::Empty)
    });

    root.render(shifty.element(Props::new()));
    root.flush().unwrap();
    root.render(shifty.element(Props::new().with("swap", true)));

    assert!(matches!(
        root.flush(),
        Err(FiberError::HookKindMismatch { index: 0, .. })
    ));
}

// =============================================================================
// EFFECTS
// =============================================================================

fn effect_logger(log: Log) -> Component {
    Component::new("Logger", move |hooks, props| {
        let name = props.str("name").unwrap_or_default().to_owned();
        let value = props.int("value").unwrap_or_default();
        let log = log.clone();
        hooks.use_effect(
            move || {
                log.borrow_mut().push(format!("create {name}{value}"));
                let log = log.clone();
                Some(Box::new(move || {
                    log.borrow_mut().push(format!("destroy {name}{value}"));
                }) as Cleanup)
            },
            deps![value],
        )?;
        Ok(Node::Empty)
    })
}

fn two_loggers(logger: &Component, value: i64) -> Node {
    fragment(vec![
        logger.element(Props::new().with("name", "a").with("value", value)),
        logger.element(Props::new().with("name", "b").with("value", value)),
    ])
    .into()
}

#[test]
fn test_effects_run_after_commit_with_cleanups_first() {
    let (_noop, root, scheduler) = setup();
    let log: Log = Rc::default();
    let logger = effect_logger(log.clone());

    root.render(two_loggers(&logger, 1));
    scheduler.run_microtasks();
    assert!(log.borrow().is_empty(), "passive effects wait for their task");
    root.flush().unwrap();
    assert_eq!(*log.borrow(), vec!["create a1", "create b1"]);

    log.borrow_mut().clear();
    root.render(two_loggers(&logger, 2));
    root.flush().unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["destroy a1", "destroy b1", "create a2", "create b2"]
    );
}

#[test]
fn test_unchanged_deps_skip_effect() {
    let (_noop, root, _scheduler) = setup();
    let log: Log = Rc::default();
    let logger = effect_logger(log.clone());

    root.render(two_loggers(&logger, 1));
    root.flush().unwrap();
    log.borrow_mut().clear();

    root.render(two_loggers(&logger, 1));
    root.flush().unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn test_unmount_runs_cleanups() {
    let (noop, root, _scheduler) = setup();
    let log: Log = Rc::default();
    let logger = effect_logger(log.clone());

    root.render(host("div", Props::new().with_children(two_loggers(&logger, 7))));
    root.flush().unwrap();
    log.borrow_mut().clear();

    root.unmount();
    root.flush().unwrap();

    assert_eq!(*log.borrow(), vec!["destroy a7", "destroy b7"]);
    assert_eq!(noop.node_count(), 0);
}

#[test]
fn test_effect_can_schedule_follow_up_render() {
    let (noop, root, _scheduler) = setup();
    let loader = Component::new("Loader", |hooks, _props| {
        let (status, set_status) = hooks.use_state(|| String::from("loading"))?;
        hooks.use_effect(
            move || {
                set_status.set("ready".into());
                None
            },
            deps![],
        )?;
        Ok(text(status))
    });

    root.render(loader.element(Props::new()));
    root.flush().unwrap();

    assert_eq!(noop.markup(), "ready");
    assert_eq!(root.commit_count(), 2);
}

// =============================================================================
// MEMO, CALLBACK AND REF
// =============================================================================

#[test]
fn test_memo_and_ref_survive_rerenders() {
    let (noop, root, _scheduler) = setup();
    let computed = Rc::new(Cell::new(0));
    let slot: Setter<i32> = Rc::default();

    let tracked = computed.clone();
    let publish = slot.clone();
    let widget = Component::new("Widget", move |hooks, props| {
        let factor = props.int("factor").unwrap_or(1);
        let (count, set_count) = hooks.use_state(|| 0i32)?;
        *publish.borrow_mut() = Some(set_count);

        let tracked = tracked.clone();
        let scaled = hooks.use_memo(
            move || {
                tracked.set(tracked.get() + 1);
                factor * 100
            },
            deps![factor],
        )?;
        let renders = hooks.use_ref(|| 0u32)?;
        *renders.borrow_mut() += 1;
        let label = hooks.use_callback(move || factor, deps![factor])?;

        let line = format!("{count}:{scaled}:{}:{}", renders.borrow(), label());
        Ok(text(line))
    });

    root.render(widget.element(Props::new().with("factor", 2)));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "0:200:1:2");

    setter_of(&slot).set(1);
    root.flush().unwrap();
    assert_eq!(noop.markup(), "1:200:2:2");
    assert_eq!(computed.get(), 1);

    root.render(widget.element(Props::new().with("factor", 3)));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "1:300:3:3");
    assert_eq!(computed.get(), 2);
}

// =============================================================================
// CONTEXT
// =============================================================================

#[test]
fn test_context_reaches_consumer_through_memo() {
    let (noop, root, _scheduler) = setup();
    let theme = create_context(String::from("light"));
    let consumer_renders = Rc::new(Cell::new(0));

    let counted = consumer_renders.clone();
    let ctx = theme.clone();
    let consumer = Component::new("Consumer", move |hooks, _props| {
        counted.set(counted.get() + 1);
        let value = hooks.use_context(&ctx);
        Ok(host("span", Props::new().with_children(value)).into())
    });
    let shell_consumer = consumer.clone();
    let shell = memo(Component::new("Shell", move |_hooks, _props| {
        Ok(host("section", Props::new().with_children(shell_consumer.element(Props::new()))).into())
    }));

    let slot: Setter<String> = Rc::default();
    let publish = slot.clone();
    let ctx = theme.clone();
    let app = Component::new("App", move |hooks, _props| {
        let (value, set_value) = hooks.use_state(|| String::from("dark"))?;
        *publish.borrow_mut() = Some(set_value);
        Ok(ctx.provider(value, shell.element(Props::new())).into())
    });

    root.render(app.element(Props::new()));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<section><span>dark</span></section>");
    assert_eq!(consumer_renders.get(), 1);

    setter_of(&slot).set("contrast".into());
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<section><span>contrast</span></section>");
    assert_eq!(consumer_renders.get(), 2);
}

#[test]
fn test_context_default_and_nearest_provider() {
    let (noop, root, _scheduler) = setup();
    let depth = create_context(0i64);
    let ctx = depth.clone();
    let reader = Component::new("Reader", move |hooks, _props| {
        let value = hooks.use_value(&ctx)?;
        Ok(Node::from(value.to_string()))
    });

    root.render(fragment(vec![
        Node::from(reader.element(Props::new())),
        depth
            .provider(
                1,
                vec![
                    Node::from(reader.element(Props::new())),
                    depth.provider(2, reader.element(Props::new())).into(),
                    reader.element(Props::new()).into(),
                ],
            )
            .into(),
        reader.element(Props::new()).into(),
    ]));
    root.flush().unwrap();

    assert_eq!(noop.markup(), "01210");
}

// =============================================================================
// TRANSITIONS
// =============================================================================

#[test]
fn test_transition_shows_pending_then_result() {
    let (_noop, root, _scheduler) = setup();
    let seen: Rc<RefCell<Vec<(bool, i32)>>> = Rc::default();
    let start_slot: Rc<RefCell<Option<StartTransition>>> = Rc::default();
    let slot: Setter<i32> = Rc::default();

    let record = seen.clone();
    let publish_start = start_slot.clone();
    let publish = slot.clone();
    let tabs = Component::new("Tabs", move |hooks, _props| {
        let (is_pending, start) = hooks.use_transition()?;
        let (tab, set_tab) = hooks.use_state(|| 0i32)?;
        *publish_start.borrow_mut() = Some(start);
        *publish.borrow_mut() = Some(set_tab);

        let record = record.clone();
        hooks.use_effect(
            move || {
                record.borrow_mut().push((is_pending, tab));
                None
            },
            None,
        )?;
        Ok(Node::from(tab))
    });

    root.render(tabs.element(Props::new()));
    root.flush().unwrap();

    let start = start_slot.borrow().clone().expect("rendered");
    let set_tab = setter_of(&slot);
    start.start(|| set_tab.set(2));
    root.flush().unwrap();

    assert_eq!(*seen.borrow(), vec![(false, 0), (true, 0), (false, 2)]);
}
