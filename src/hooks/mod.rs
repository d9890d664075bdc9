//! Hooks - per-component state kept in call order on the fiber.
//!
//! # Mount vs Update
//!
//! A component body receives [`Hooks`], which is either a [`MountHooks`]
//! (first render: allocate every slot) or an [`UpdateHooks`] (re-render:
//! walk the previous render's slots in the same order). The two never mix
//! within one render, and an update render that calls a different number or
//! kind of hooks fails with a [`FiberError`].
//!
//! ```ignore
//! let counter = Component::new("Counter", |hooks, _props| {
//!     let (count, set_count) = hooks.use_state(|| 0)?;
//!     hooks.use_effect(move || { println!("{count}"); None }, deps![count])?;
//!     Ok(host("span", Props::new().with_children(count)).into())
//! });
//! ```

mod dispatch;
mod effect;
mod mount;
mod update;

pub use dispatch::{Dispatch, StartTransition};
pub use effect::{are_hook_inputs_equal, Cleanup, Deps};
pub use mount::MountHooks;
pub use update::UpdateHooks;

pub(crate) use dispatch::UpdateSink;
pub(crate) use effect::{commit_hook_effect_list_mount, commit_hook_effect_list_unmount, Effect};

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::context::{Context, ContextKey, ContextStack};
use crate::error::{FiberError, Result, Unwind};
use crate::fiber::{FiberId, Flags};
use crate::lanes::Lanes;
use crate::scheduler::Scheduler;
use crate::thenable::Thenable;
use crate::update_queue::{UpdateQueue, UpdateRing};

// =============================================================================
// Hook Slots
// =============================================================================

/// One slot of a component's hook list.
#[derive(Clone)]
pub(crate) enum Hook {
    /// `Rc<StateSlot<S>>`
    State(Rc<dyn Any>),
    Effect(Rc<Effect>),
    Memo {
        value: Rc<dyn Any>,
        deps: Option<Deps>,
    },
    /// `Rc<RefCell<T>>`
    Ref(Rc<dyn Any>),
}

impl Hook {
    pub fn kind(&self) -> &'static str {
        match self {
            Hook::State(_) => "state",
            Hook::Effect(_) => "effect",
            Hook::Memo { .. } => "memo",
            Hook::Ref(_) => "ref",
        }
    }
}

/// Typed contents of a state hook.
pub(crate) struct StateSlot<S> {
    pub memoized: S,
    pub base_state: S,
    /// Updates not yet folded into `base_state`. Pending updates are moved
    /// here when a render reads them, so a discarded render loses nothing.
    pub base_queue: RefCell<UpdateRing<S>>,
    pub queue: UpdateQueue<S>,
    pub dispatch: Dispatch<S>,
}

// =============================================================================
// Cursor
// =============================================================================

/// Everything a component render produced besides its children.
pub(crate) struct HookOutput {
    pub hooks: Vec<Hook>,
    pub effects: Vec<Rc<Effect>>,
    pub flags: Flags,
    pub skipped_lanes: Lanes,
    pub did_receive_update: bool,
    pub contexts: SmallVec<[ContextKey; 2]>,
}

/// Render-scoped hook state shared by the mount and update sets.
pub(crate) struct HookCursor<'a> {
    fiber: FiberId,
    render_lanes: Lanes,
    current: Vec<Hook>,
    hooks: Vec<Hook>,
    effects: Vec<Rc<Effect>>,
    flags: Flags,
    skipped_lanes: Lanes,
    did_receive_update: bool,
    contexts: SmallVec<[ContextKey; 2]>,
    stack: &'a ContextStack,
    sink: Weak<dyn UpdateSink>,
    scheduler: &'a Scheduler,
}

impl<'a> HookCursor<'a> {
    pub fn new(
        fiber: FiberId,
        render_lanes: Lanes,
        current: Vec<Hook>,
        stack: &'a ContextStack,
        sink: Weak<dyn UpdateSink>,
        scheduler: &'a Scheduler,
    ) -> Self {
        Self {
            fiber,
            render_lanes,
            current,
            hooks: Vec::new(),
            effects: Vec::new(),
            flags: Flags::empty(),
            skipped_lanes: Lanes::empty(),
            did_receive_update: false,
            contexts: SmallVec::new(),
            stack,
            sink,
            scheduler,
        }
    }

    /// Previous render's slot at the next position.
    fn next_current(&self) -> Result<Hook> {
        let index = self.hooks.len();
        self.current
            .get(index)
            .cloned()
            .ok_or(FiberError::HookCountMismatch {
                expected: self.current.len(),
                found: index + 1,
            })
    }

    fn index(&self) -> usize {
        self.hooks.len()
    }

    fn push(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    fn push_effect(&mut self, effect: Rc<Effect>) {
        self.effects.push(effect.clone());
        self.hooks.push(Hook::Effect(effect));
    }

    fn read_context<T: Clone + PartialEq + 'static>(&mut self, context: &Context<T>) -> T {
        let key = context.key();
        if !self.contexts.contains(&key) {
            self.contexts.push(key);
        }
        context.read(self.stack)
    }

    fn into_output(self) -> HookOutput {
        HookOutput {
            hooks: self.hooks,
            effects: self.effects,
            flags: self.flags,
            skipped_lanes: self.skipped_lanes,
            did_receive_update: self.did_receive_update,
            contexts: self.contexts,
        }
    }
}

fn kind_mismatch(index: usize, called: &'static str, previous: &Hook) -> FiberError {
    FiberError::HookKindMismatch {
        index,
        expected: previous.kind(),
        found: called,
    }
}

// =============================================================================
// Hooks
// =============================================================================

/// Values that `use_value` can read: contexts and thenables.
pub trait Usable {
    type Output;

    fn use_with(self, hooks: &mut Hooks<'_>) -> std::result::Result<Self::Output, Unwind>;
}

impl<T: Clone + PartialEq + 'static> Usable for &Context<T> {
    type Output = T;

    fn use_with(self, hooks: &mut Hooks<'_>) -> std::result::Result<T, Unwind> {
        Ok(hooks.use_context(self))
    }
}

impl<T: Clone + 'static> Usable for &Thenable<T> {
    type Output = T;

    fn use_with(self, _hooks: &mut Hooks<'_>) -> std::result::Result<T, Unwind> {
        self.read()
    }
}

/// Hook API passed to component bodies.
pub enum Hooks<'a> {
    Mount(MountHooks<'a>),
    Update(UpdateHooks<'a>),
}

impl<'a> Hooks<'a> {
    pub(crate) fn mount(cursor: HookCursor<'a>) -> Self {
        Hooks::Mount(MountHooks::new(cursor))
    }

    pub(crate) fn update(cursor: HookCursor<'a>) -> Self {
        Hooks::Update(UpdateHooks::new(cursor))
    }

    pub fn is_mount(&self) -> bool {
        matches!(self, Hooks::Mount(_))
    }

    fn cursor(&mut self) -> &mut HookCursor<'a> {
        match self {
            Hooks::Mount(h) => h.cursor(),
            Hooks::Update(h) => h.cursor(),
        }
    }

    /// Local state with a setter. `init` runs on mount only.
    pub fn use_state<S: Clone + PartialEq + 'static>(
        &mut self,
        init: impl FnOnce() -> S,
    ) -> Result<(S, Dispatch<S>)> {
        match self {
            Hooks::Mount(h) => h.use_state(init),
            Hooks::Update(h) => h.use_state(),
        }
    }

    /// Passive effect run after commit when `deps` change (every commit for `None`).
    pub fn use_effect(
        &mut self,
        create: impl FnOnce() -> Option<Cleanup> + 'static,
        deps: Option<Deps>,
    ) -> Result<()> {
        match self {
            Hooks::Mount(h) => h.use_effect(create, deps),
            Hooks::Update(h) => h.use_effect(create, deps),
        }
    }

    /// Cached value, recomputed when `deps` change.
    pub fn use_memo<T: Clone + 'static>(&mut self, create: impl FnOnce() -> T, deps: Option<Deps>) -> Result<T> {
        match self {
            Hooks::Mount(h) => h.use_memo(create, deps),
            Hooks::Update(h) => h.use_memo(create, deps),
        }
    }

    /// Cached callback, replaced when `deps` change.
    pub fn use_callback<F: 'static>(&mut self, callback: F, deps: Option<Deps>) -> Result<Rc<F>> {
        self.use_memo(move || Rc::new(callback), deps)
    }

    /// Mutable box that survives re-renders.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Result<Rc<RefCell<T>>> {
        match self {
            Hooks::Mount(h) => h.use_ref(init),
            Hooks::Update(h) => h.use_ref(),
        }
    }

    /// Value of the nearest provider of `context`, recorded as a dependency.
    pub fn use_context<T: Clone + PartialEq + 'static>(&mut self, context: &Context<T>) -> T {
        self.cursor().read_context(context)
    }

    /// Pending flag plus a starter for low-priority updates.
    pub fn use_transition(&mut self) -> Result<(bool, StartTransition)> {
        let (is_pending, set_pending) = self.use_state(|| false)?;
        let scheduler = self.cursor().scheduler.clone();
        let start = self.use_memo(move || StartTransition::new(set_pending, scheduler), crate::deps![])?;
        Ok((is_pending, start))
    }

    /// Read a context or an awaitable. An unsettled awaitable suspends.
    pub fn use_value<U: Usable>(&mut self, usable: U) -> std::result::Result<U::Output, Unwind> {
        usable.use_with(self)
    }

    /// Close the render, checking the hook count against the previous render.
    pub(crate) fn finish(self) -> Result<HookOutput> {
        match self {
            Hooks::Mount(h) => Ok(h.finish()),
            Hooks::Update(h) => h.finish(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
