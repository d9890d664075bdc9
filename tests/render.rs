//! Mounting, diffing and commit behavior against the in-memory host.
//!
//! Run with: cargo test --test render

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
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

fn keyed_list(keys: &[u32]) -> Node {
    let items: Vec<Node> = keys
        .iter()
        .map(|k| {
            host("li", Props::new().with_children(k.to_string()))
                .with_key(k.to_string())
                .into()
        })
        .collect();
    host("ul", Props::new().with_children(items)).into()
}

fn list_markup(keys: &[u32]) -> String {
    let items: String = keys.iter().map(|k| format!("<li>{k}</li>")).collect();
    format!("<ul>{items}</ul>")
}

// =============================================================================
// MOUNT AND UPDATE
// =============================================================================

#[test]
fn test_mount_builds_host_tree() {
    let (noop, root) = setup();
    root.render(host(
        "div",
        Props::new()
            .with("id", "main")
            .with_children(vec![text("hi"), host("span", Props::new()).into()]),
    ));
    root.flush().unwrap();

    assert_eq!(noop.markup(), r#"<div id="main">hi<span></span></div>"#);
    assert_eq!(noop.node_count(), 3);
    assert_eq!(root.commit_count(), 1);
    // one append puts the finished subtree into the container
    let appends: Vec<_> = noop
        .mutations()
        .into_iter()
        .filter(|op| matches!(op, HostOp::Append { .. }))
        .collect();
    assert_eq!(appends.len(), 1);
}

#[test]
fn test_prop_and_text_updates_reuse_instances() {
    let (noop, root) = setup();
    root.render(host("p", Props::new().with("class", "a").with_children("one")));
    root.flush().unwrap();
    let p = noop.children_of(noop.container())[0];
    noop.clear_ops();

    root.render(host("p", Props::new().with("class", "b").with_children("two")));
    root.flush().unwrap();

    assert_eq!(noop.markup(), r#"<p class="b">two</p>"#);
    assert_eq!(noop.children_of(noop.container()), vec![p]);
    let ops = noop.ops();
    assert!(ops.contains(&HostOp::Update(p)));
    assert!(ops.iter().any(|op| matches!(op, HostOp::TextUpdate(_))));
    assert!(!ops.iter().any(|op| matches!(op, HostOp::Create(_) | HostOp::CreateText(_))));
}

#[test]
fn test_type_change_replaces_node() {
    let (noop, root) = setup();
    root.render(host("p", Props::new().with_children("x")));
    root.flush().unwrap();
    let before = noop.children_of(noop.container());

    root.render(host("span", Props::new().with_children("x")));
    root.flush().unwrap();

    assert_eq!(noop.markup(), "<span>x</span>");
    assert_ne!(noop.children_of(noop.container()), before);
    assert_eq!(noop.node_count(), 2);
}

#[test]
fn test_identical_rerender_commits_nothing() {
    let (noop, root) = setup();
    let tree: Node = host(
        "div",
        Props::new().with_children(vec![text("a"), host("b", Props::new()).into()]),
    )
    .into();
    root.render(tree.clone());
    root.flush().unwrap();
    let fibers = root.fiber_count();
    noop.clear_ops();

    root.render(tree);
    root.flush().unwrap();

    assert_eq!(root.commit_count(), 2);
    assert!(root.last_commit_flags().is_empty());
    assert!(noop.ops().is_empty());
    assert_eq!(root.fiber_count(), fibers);
}

#[test]
fn test_unmount_removes_everything() {
    let (noop, root) = setup();
    root.render(host(
        "div",
        Props::new().with_children(host("span", Props::new().with_children("x"))),
    ));
    root.flush().unwrap();

    root.unmount();
    root.flush().unwrap();

    assert_eq!(noop.markup(), "");
    assert_eq!(noop.node_count(), 0);
    let removes: Vec<_> = noop
        .mutations()
        .into_iter()
        .filter(|op| matches!(op, HostOp::Remove { .. }))
        .collect();
    assert_eq!(removes.len(), 1, "only the topmost host node is detached");
}

#[test]
fn test_fragments_flatten_into_parent() {
    let (noop, root) = setup();
    root.render(host(
        "div",
        Props::new().with_children(vec![
            Node::from(fragment(vec![text("a"), text("b")])),
            text("c"),
        ]),
    ));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<div>abc</div>");

    root.render(host(
        "div",
        Props::new().with_children(vec![
            Node::from(host("i", Props::new())),
            Node::from(fragment(vec![text("a"), text("b")])),
            text("c"),
        ]),
    ));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<div><i></i>abc</div>");
}

// =============================================================================
// KEYED CHILDREN
// =============================================================================

#[test]
fn test_keyed_reorder_moves_without_recreating() {
    let (noop, root) = setup();
    root.render(keyed_list(&[1, 2, 3, 4]));
    root.flush().unwrap();
    let ul = noop.children_of(noop.container())[0];
    let mut before = noop.children_of(ul);
    noop.clear_ops();

    root.render(keyed_list(&[4, 1, 2, 3]));
    root.flush().unwrap();

    assert_eq!(noop.markup(), list_markup(&[4, 1, 2, 3]));
    assert!(!noop.ops().iter().any(|op| matches!(op, HostOp::Create(_))));
    let mut after = noop.children_of(ul);
    before.sort_unstable();
    after.sort_unstable();
    assert_eq!(before, after);
}

#[test]
fn test_keyed_insert_and_delete() {
    let (noop, root) = setup();
    root.render(keyed_list(&[1, 2, 3]));
    root.flush().unwrap();

    root.render(keyed_list(&[0, 1, 3, 5]));
    root.flush().unwrap();

    assert_eq!(noop.markup(), list_markup(&[0, 1, 3, 5]));
    // ul + four li + four texts
    assert_eq!(noop.node_count(), 9);
}

#[test]
fn test_holes_keep_sibling_positions() {
    let (noop, root) = setup();
    let render = |show: bool| {
        let first: Node = if show { text("a") } else { Node::Empty };
        host("div", Props::new().with_children(vec![first, text("b")]))
    };
    root.render(render(true));
    root.flush().unwrap();
    let div = noop.children_of(noop.container())[0];
    let b = noop.children_of(div)[1];

    root.render(render(false));
    root.flush().unwrap();

    assert_eq!(noop.markup(), "<div>b</div>");
    assert_eq!(noop.children_of(div), vec![b]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_keyed_lists_converge(
        first in prop::sample::subsequence((0u32..10).collect::<Vec<_>>(), 0..10)
            .prop_shuffle(),
        second in prop::sample::subsequence((0u32..10).collect::<Vec<_>>(), 0..10)
            .prop_shuffle(),
    ) {
        let (noop, root) = setup();
        root.render(keyed_list(&first));
        root.flush().unwrap();
        root.render(keyed_list(&second));
        root.flush().unwrap();

        prop_assert_eq!(noop.markup(), list_markup(&second));
        prop_assert_eq!(noop.node_count(), 1 + 2 * second.len());
    }

    #[test]
    fn prop_keyed_permutation_only_moves(
        (first, second) in (1usize..12).prop_flat_map(|n| {
            let keys: Vec<u32> = (0..n as u32).collect();
            (Just(keys.clone()).prop_shuffle(), Just(keys).prop_shuffle())
        }),
    ) {
        let (noop, root) = setup();
        root.render(keyed_list(&first));
        root.flush().unwrap();
        let ul = noop.children_of(noop.container())[0];
        let mut before = noop.children_of(ul);
        noop.clear_ops();

        root.render(keyed_list(&second));
        root.flush().unwrap();

        prop_assert_eq!(noop.markup(), list_markup(&second));
        let churn: Vec<HostOp> = noop
            .ops()
            .into_iter()
            .filter(|op| {
                matches!(op, HostOp::Create(_) | HostOp::CreateText(_) | HostOp::Remove { .. })
            })
            .collect();
        prop_assert!(churn.is_empty(), "reorder created or removed nodes: {churn:?}");
        let mut after = noop.children_of(ul);
        before.sort_unstable();
        after.sort_unstable();
        prop_assert_eq!(before, after);
    }
}

// =============================================================================
// COMPONENTS
// =============================================================================

#[test]
fn test_component_receives_props() {
    let (noop, root) = setup();
    let greeting = Component::new("Greeting", |_hooks, props| {
        let name = props.str("name").unwrap_or("nobody").to_owned();
        Ok(host("h1", Props::new().with_children(format!("hello {name}"))).into())
    });

    root.render(greeting.element(Props::new().with("name", "ada")));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "<h1>hello ada</h1>");
}

#[test]
fn test_memo_skips_equal_props() {
    let (noop, root) = setup();
    let renders = Rc::new(Cell::new(0));
    let counted = renders.clone();
    let label = memo(Component::new("Label", move |_hooks, props| {
        counted.set(counted.get() + 1);
        Ok(text(props.str("text").unwrap_or_default().to_owned()))
    }));

    let setter: Rc<RefCell<Option<Dispatch<i32>>>> = Rc::default();
    let slot = setter.clone();
    let app = Component::new("App", move |hooks, _props| {
        let (count, set_count) = hooks.use_state(|| 0i32)?;
        *slot.borrow_mut() = Some(set_count);
        Ok(host(
            "div",
            Props::new().with_children(vec![
                Node::from(count),
                label.element(Props::new().with("text", "fixed")).into(),
            ]),
        )
        .into())
    });

    root.render(app.element(Props::new()));
    root.flush().unwrap();
    assert_eq!(renders.get(), 1);

    setter.borrow().as_ref().unwrap().set(5);
    root.flush().unwrap();

    assert_eq!(noop.markup(), "<div>5fixed</div>");
    assert_eq!(renders.get(), 1);
}

#[test]
fn test_render_error_surfaces_and_keeps_tree() {
    let (noop, root) = setup();
    let flaky = Component::new("Flaky", |_hooks, props| {
        if props.bool("fail").unwrap_or(false) {
            return Err(FiberError::Render("broken".into()).into());
        }
        Ok(text("fine"))
    });

    root.render(flaky.element(Props::new()));
    root.flush().unwrap();

    root.render(flaky.element(Props::new().with("fail", true)));
    let err = root.flush().unwrap_err();
    assert_eq!(err, FiberError::Render("broken".into()));
    assert_eq!(noop.markup(), "fine");
    assert!(!root.pending_lanes().contains(Lanes::SYNC));

    root.render(flaky.element(Props::new()));
    root.flush().unwrap();
    assert_eq!(noop.markup(), "fine");
}

// =============================================================================
// REFS
// =============================================================================

#[test]
fn test_object_ref_follows_instance() {
    let (noop, root) = setup();
    let node_ref = NodeRef::new();
    root.render(host("input", Props::new()).with_ref(&node_ref));
    root.flush().unwrap();

    let input = noop.children_of(noop.container())[0];
    assert_eq!(node_ref.get::<NoopId>(), Some(input));

    root.unmount();
    root.flush().unwrap();
    assert_eq!(node_ref.get::<NoopId>(), None);
}

#[test]
fn test_callback_ref_swaps_on_change() {
    let (_noop, root) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    let make = |name: &'static str| {
        let log = log.clone();
        NodeRef::callback(move |instance| {
            log.borrow_mut().push(format!("{name}:{}", instance.is_some()));
        })
    };
    let first = make("first");
    let second = make("second");

    root.render(host("div", Props::new()).with_ref(&first));
    root.flush().unwrap();
    root.render(host("div", Props::new()).with_ref(&second));
    root.flush().unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["first:true", "first:false", "second:true"]
    );
}
