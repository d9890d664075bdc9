//! Effect records and dependency lists.
//!
//! An effect keeps its destroy function in an [`EffectInstance`] shared by
//! every record the same hook produces across renders. A record from a
//! discarded render therefore never strands a cleanup.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::fiber::HookFlags;

/// Cleanup function returned by an effect.
pub type Cleanup = Box<dyn FnOnce()>;

pub(crate) type EffectCreate = Box<dyn FnOnce() -> Option<Cleanup>>;

// =============================================================================
// Dependencies
// =============================================================================

type DepsEq = fn(&dyn Any, &dyn Any) -> bool;

fn deps_eq<D: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<D>(), b.downcast_ref::<D>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Dependency list of an effect or memo. Usually built with [`deps!`](crate::deps).
#[derive(Clone)]
pub struct Deps {
    value: Rc<dyn Any>,
    eq: DepsEq,
}

impl Deps {
    pub fn new<D: PartialEq + 'static>(deps: D) -> Self {
        Self {
            value: Rc::new(deps),
            eq: deps_eq::<D>,
        }
    }
}

impl PartialEq for Deps {
    fn eq(&self, other: &Self) -> bool {
        (self.eq)(self.value.as_ref(), other.value.as_ref())
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deps")
    }
}

/// Whether a hook can reuse its previous result. `None` deps never match.
pub fn are_hook_inputs_equal(next: Option<&Deps>, prev: Option<&Deps>) -> bool {
    match (next, prev) {
        (Some(next), Some(prev)) => next == prev,
        _ => false,
    }
}

/// Build `Some(Deps)` from a list of values.
///
/// `deps![]` runs an effect once; `deps![a, b]` re-runs when `a` or `b` change.
#[macro_export]
macro_rules! deps {
    () => {
        ::core::option::Option::Some($crate::Deps::new(()))
    };
    ($($dep:expr),+ $(,)?) => {
        ::core::option::Option::Some($crate::Deps::new(($($dep,)+)))
    };
}

// =============================================================================
// Effects
// =============================================================================

/// Destroy slot shared across renders of one effect hook.
#[derive(Default)]
pub(crate) struct EffectInstance {
    destroy: RefCell<Option<Cleanup>>,
}

impl EffectInstance {
    pub fn run_destroy(&self) {
        let destroy = self.destroy.borrow_mut().take();
        if let Some(destroy) = destroy {
            destroy();
        }
    }

    fn set_destroy(&self, destroy: Option<Cleanup>) {
        *self.destroy.borrow_mut() = destroy;
    }
}

/// One effect record produced by one render.
pub(crate) struct Effect {
    pub tag: HookFlags,
    create: RefCell<Option<EffectCreate>>,
    pub instance: Rc<EffectInstance>,
    pub deps: Option<Deps>,
}

impl Effect {
    pub fn new(
        tag: HookFlags,
        create: Option<EffectCreate>,
        instance: Rc<EffectInstance>,
        deps: Option<Deps>,
    ) -> Self {
        Self {
            tag,
            create: RefCell::new(create),
            instance,
            deps,
        }
    }

    /// Run the create function once, storing its cleanup.
    pub fn run_create(&self) {
        let create = self.create.borrow_mut().take();
        if let Some(create) = create {
            self.instance.set_destroy(create());
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect").field("tag", &self.tag).finish_non_exhaustive()
    }
}

/// Run destroys of the records in `effects` whose tag contains `tag`.
pub(crate) fn commit_hook_effect_list_unmount(tag: HookFlags, effects: &[Rc<Effect>]) {
    for effect in effects.iter().filter(|e| e.tag.contains(tag)) {
        effect.instance.run_destroy();
    }
}

/// Run creates of the records in `effects` whose tag contains `tag`.
pub(crate) fn commit_hook_effect_list_mount(tag: HookFlags, effects: &[Rc<Effect>]) {
    for effect in effects.iter().filter(|e| e.tag.contains(tag)) {
        effect.run_create();
    }
}
