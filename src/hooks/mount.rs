//! Hooks for a component's first render.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use super::effect::{Cleanup, Deps, Effect, EffectInstance};
use super::{Dispatch, Hook, HookCursor, HookOutput, StateSlot};
use crate::error::Result;
use crate::fiber::{Flags, HookFlags};
use crate::update_queue::{UpdateQueue, UpdateRing};

/// Hook set that allocates a new slot per call.
pub struct MountHooks<'a> {
    cursor: HookCursor<'a>,
}

impl<'a> MountHooks<'a> {
    pub(crate) fn new(cursor: HookCursor<'a>) -> Self {
        Self { cursor }
    }

    pub(crate) fn cursor(&mut self) -> &mut HookCursor<'a> {
        &mut self.cursor
    }

    pub(crate) fn finish(self) -> HookOutput {
        self.cursor.into_output()
    }

    pub fn use_state<S: Clone + PartialEq + 'static>(
        &mut self,
        init: impl FnOnce() -> S,
    ) -> Result<(S, Dispatch<S>)> {
        let cursor = &mut self.cursor;
        let initial = init();
        let queue = UpdateQueue::new();
        queue.set_last_rendered_state(initial.clone());
        let dispatch = Dispatch::new(
            cursor.fiber,
            queue.clone(),
            cursor.sink.clone(),
            cursor.scheduler.clone(),
        );
        let slot: Rc<dyn Any> = Rc::new(StateSlot {
            memoized: initial.clone(),
            base_state: initial.clone(),
            base_queue: RefCell::new(UpdateRing::new()),
            queue,
            dispatch: dispatch.clone(),
        });
        cursor.push(Hook::State(slot));
        Ok((initial, dispatch))
    }

    pub fn use_effect(
        &mut self,
        create: impl FnOnce() -> Option<Cleanup> + 'static,
        deps: Option<Deps>,
    ) -> Result<()> {
        let cursor = &mut self.cursor;
        cursor.flags |= Flags::PASSIVE_EFFECT;
        cursor.push_effect(Rc::new(Effect::new(
            HookFlags::HAS_EFFECT | HookFlags::PASSIVE,
            Some(Box::new(create)),
            Rc::new(EffectInstance::default()),
            deps,
        )));
        Ok(())
    }

    pub fn use_memo<T: Clone + 'static>(&mut self, create: impl FnOnce() -> T, deps: Option<Deps>) -> Result<T> {
        let value = create();
        self.cursor.push(Hook::Memo {
            value: Rc::new(value.clone()),
            deps,
        });
        Ok(value)
    }

    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Result<Rc<RefCell<T>>> {
        let cell = Rc::new(RefCell::new(init()));
        let erased: Rc<dyn Any> = cell.clone();
        self.cursor.push(Hook::Ref(erased));
        Ok(cell)
    }
}
