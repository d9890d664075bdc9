//! Suspense boundaries, fallbacks and retries.
//!
//! Run with: cargo test --test suspense

use std::cell::RefCell;
use std::rc::Rc;

use spark_fiber::*;

// =============================================================================
// HELPERS
// =============================================================================

fn setup() -> (NoopHost, Root<NoopHost>) {
    let scheduler = Scheduler::with_clock(ManualClock::new());
    let noop = NoopHost::new();
    let root = create_root(noop.clone(), noop.container(), &scheduler);
    (noop, root)
}

/// Component that renders `<p>` with whatever the shared thenable holds.
fn reader(source: Rc<RefCell<Thenable<String>>>) -> Component {
    Component::new("Reader", move |hooks, _props| {
        let data = source.borrow().clone();
        let value = hooks.use_value(&data)?;
        Ok(host("p", Props::new().with_children(value)).into())
    })
}

fn app(reader: &Component, version: i64) -> Element {
    host(
        "main",
        Props::new().with_children(suspense(
            text("loading"),
            reader.element(Props::new().with("version", version)),
        )),
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[test]
fn test_fallback_then_content_after_resolve() {
    let (noop, root) = setup();
    let data = Thenable::new();
    let source = Rc::new(RefCell::new(data.clone()));
    let reader = reader(source);

    root.render(app(&reader, 1));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<main>loading</main>");
    assert_eq!(data.status(), ThenableStatus::Pending);

    data.resolve("hello".into());
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<main><p>hello</p></main>");
    // main, p and its text; the fallback text is gone
    assert_eq!(noop.node_count(), 3);
}

#[test]
fn test_resolved_thenable_renders_directly() {
    let (noop, root) = setup();
    let source = Rc::new(RefCell::new(Thenable::resolved(String::from("ready"))));
    let reader = reader(source);

    root.render(app(&reader, 1));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<main><p>ready</p></main>");
    assert_eq!(root.commit_count(), 1);
}

#[test]
fn test_visible_content_is_hidden_not_removed() {
    let (noop, root) = setup();
    let source = Rc::new(RefCell::new(Thenable::resolved(String::from("one"))));
    let reader = reader(source.clone());

    root.render(app(&reader, 1));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<main><p>one</p></main>");
    let main = noop.children_of(noop.container())[0];
    let p = noop.children_of(main)[0];

    let next = Thenable::new();
    *source.borrow_mut() = next.clone();
    noop.clear_ops();
    root.render(app(&reader, 2));
    root.flush().unwrap();

    assert_eq!(noop.markup(), "<main>loading</main>");
    assert!(noop.ops().contains(&HostOp::Hide(p)));
    assert!(noop.node(p).is_some_and(|node| node.hidden));

    next.resolve("two".into());
    root.flush().unwrap();

    assert_eq!(noop.markup(), "<main><p>two</p></main>");
    assert!(noop.ops().contains(&HostOp::Unhide(p)));
    assert_eq!(noop.children_of(main), vec![p]);
}

#[test]
fn test_rejection_surfaces_as_error() {
    let (noop, root) = setup();
    let data = Thenable::new();
    let source = Rc::new(RefCell::new(data.clone()));
    let reader = reader(source);

    root.render(app(&reader, 1));
    root.flush().unwrap();

    data.reject("offline");
    let err = root.flush().unwrap_err();
    assert_eq!(err, FiberError::Rejected("offline".into()));
    assert_eq!(noop.markup(), "<main>loading</main>");
}

#[test]
fn test_suspending_without_boundary_leaves_tree_untouched() {
    let (noop, root) = setup();
    let data = Thenable::new();
    let source = Rc::new(RefCell::new(data.clone()));
    let reader = reader(source);

    root.render(host("div", Props::new().with_children("before")));
    root.flush().unwrap();

    root.render(reader.element(Props::new()));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<div>before</div>");

    data.resolve("after".into());
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<p>after</p>");
}

#[test]
fn test_retry_renders_every_reader_in_one_commit() {
    let (noop, root) = setup();
    let data = Thenable::new();
    let source = Rc::new(RefCell::new(data.clone()));
    let reader = reader(source);

    // two readers of the same thenable under one boundary
    root.render(suspense(
        text("wait"),
        vec![
            Node::from(reader.element(Props::new()).with_key("a")),
            reader.element(Props::new()).with_key("b").into(),
        ],
    ));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "wait");
    let commits = root.commit_count();

    data.resolve("x".into());
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<p>x</p><p>x</p>");
    assert_eq!(root.commit_count(), commits + 1);
}
