//! Context - values provided to a subtree without threading props.
//!
//! # Propagation
//!
//! When a provider re-renders with a value that compares unequal, every
//! fiber below it that read the context during its last render is scheduled
//! at the render lane, and the path back up to the provider gets the lane in
//! its `child_lanes` so the bailout walk reaches it:
//!
//! ```text
//!   Provider (value changed)
//!     └── Memo (bails out, child_lanes |= lane)
//!           └── Reader (deps include ctx → lanes |= lane)
//! ```
//!
//! A nested provider of the same context shadows the outer one, so the walk
//! does not descend into it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;

use crate::element::{Element, ElementType, Node, PropValue, Props};
use crate::fiber::{FiberArena, FiberRef, WorkTag};
use crate::host::HostConfig;
use crate::lanes::Lane;

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(1);

type ValueEq = fn(&dyn Any, &dyn Any) -> bool;

fn value_eq<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Type-erased identity of a context.
#[derive(Clone, Copy)]
pub struct ContextKey {
    id: usize,
    eq: ValueEq,
}

impl ContextKey {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether two provided values compare equal.
    pub fn values_equal(&self, a: &dyn Any, b: &dyn Any) -> bool {
        (self.eq)(a, b)
    }
}

impl PartialEq for ContextKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContextKey {}

impl fmt::Debug for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextKey({})", self.id)
    }
}

/// A context carrying values of type `T`.
#[derive(Clone)]
pub struct Context<T> {
    key: ContextKey,
    default: T,
}

/// Create a context whose readers see `default` when no provider is above them.
pub fn create_context<T: Clone + PartialEq + 'static>(default: T) -> Context<T> {
    Context {
        key: ContextKey {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            eq: value_eq::<T>,
        },
        default,
    }
}

impl<T: Clone + PartialEq + 'static> Context<T> {
    pub fn key(&self) -> ContextKey {
        self.key
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Provider element supplying `value` to `children`.
    pub fn provider(&self, value: T, children: impl Into<Node>) -> Element {
        let value: Rc<dyn Any> = Rc::new(value);
        Element::new(
            ElementType::Provider(self.key),
            Props::new()
                .with("value", PropValue::Any(value))
                .with_children(children),
        )
    }

    /// Value visible through `stack`, or the default.
    pub(crate) fn read(&self, stack: &ContextStack) -> T {
        stack
            .current(self.key.id)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.key.id)
            .field("default", &self.default)
            .finish()
    }
}

/// Value a provider element carries.
pub(crate) fn provided_value(props: &Props) -> Option<Rc<dyn Any>> {
    match props.get("value") {
        Some(PropValue::Any(value)) => Some(value.clone()),
        _ => None,
    }
}

// =============================================================================
// Provider Stack
// =============================================================================

/// Provider values along the current begin path.
#[derive(Default)]
pub(crate) struct ContextStack {
    current: FxHashMap<usize, Rc<dyn Any>>,
    saved: Vec<(usize, Option<Rc<dyn Any>>)>,
}

impl ContextStack {
    pub fn push(&mut self, key: ContextKey, value: Rc<dyn Any>) {
        let prev = self.current.insert(key.id, value);
        self.saved.push((key.id, prev));
    }

    pub fn pop(&mut self) {
        let Some((id, prev)) = self.saved.pop() else {
            return;
        };
        match prev {
            Some(value) => self.current.insert(id, value),
            None => self.current.remove(&id),
        };
    }

    pub fn current(&self, id: usize) -> Option<&Rc<dyn Any>> {
        self.current.get(&id)
    }
}

// =============================================================================
// Propagation
// =============================================================================

/// Schedule `lane` on every consumer of `key` below `provider`.
pub(crate) fn propagate_context_change<H: HostConfig>(
    arena: &mut FiberArena<H>,
    provider: FiberRef,
    key: ContextKey,
    lane: Lane,
) {
    let mut stack: Vec<FiberRef> = arena[provider].child.into_iter().collect();
    while let Some(fiber) = stack.pop() {
        if let Some(sibling) = arena[fiber].sibling {
            stack.push(sibling);
        }

        let reads_key = arena[fiber].dependencies.contexts.contains(&key);
        if reads_key {
            arena.merge_lanes(fiber.id, lane);
            if let Some(ret) = arena[fiber].ret {
                schedule_context_work_on_parent_path(arena, ret, provider, lane);
            }
            arena[fiber].dependencies.lanes |= lane;
        }

        let shadows = arena[fiber].tag == WorkTag::ContextProvider
            && matches!(&arena[fiber].element_type, Some(ElementType::Provider(k)) if *k == key);
        if !shadows {
            if let Some(child) = arena[fiber].child {
                stack.push(child);
            }
        }
    }
}

/// Add `lane` to `child_lanes` from `parent` up to and including `until`.
pub(crate) fn schedule_context_work_on_parent_path<H: HostConfig>(
    arena: &mut FiberArena<H>,
    parent: FiberRef,
    until: FiberRef,
    lane: Lane,
) {
    let mut node = Some(parent);
    while let Some(fiber) = node {
        arena.merge_child_lanes(fiber.id, lane);
        if fiber.id == until.id {
            break;
        }
        node = arena[fiber].ret;
    }
}

// =============================================================================
// Tests
// =============================================================================
