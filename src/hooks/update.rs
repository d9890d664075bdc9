//! Hooks for re-renders: each call reads the slot the previous render left
//! at the same position.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use super::effect::{are_hook_inputs_equal, Cleanup, Deps, Effect};
use super::{kind_mismatch, Dispatch, Hook, HookCursor, HookOutput, StateSlot};
use crate::error::{FiberError, Result};
use crate::fiber::{Flags, HookFlags};
use crate::update_queue::process_update_queue;

/// Hook set that walks the previous render's slots.
pub struct UpdateHooks<'a> {
    cursor: HookCursor<'a>,
}

impl<'a> UpdateHooks<'a> {
    pub(crate) fn new(cursor: HookCursor<'a>) -> Self {
        Self { cursor }
    }

    pub(crate) fn cursor(&mut self) -> &mut HookCursor<'a> {
        &mut self.cursor
    }

    pub(crate) fn finish(self) -> Result<HookOutput> {
        let expected = self.cursor.current.len();
        let found = self.cursor.hooks.len();
        if expected != found {
            return Err(FiberError::HookCountMismatch { expected, found });
        }
        Ok(self.cursor.into_output())
    }

    pub fn use_state<S: Clone + PartialEq + 'static>(&mut self) -> Result<(S, Dispatch<S>)> {
        let cursor = &mut self.cursor;
        let index = cursor.index();
        let previous = cursor.next_current()?;
        let Hook::State(erased) = &previous else {
            return Err(kind_mismatch(index, "state", &previous));
        };
        let slot = erased
            .clone()
            .downcast::<StateSlot<S>>()
            .map_err(|_| FiberError::HookTypeMismatch { index })?;

        // move pending updates onto the committed slot before replaying
        let pending = slot.queue.take_pending();
        let processed = {
            let mut base_queue = slot.base_queue.borrow_mut();
            base_queue.append(pending);
            let mut skipped = cursor.skipped_lanes;
            let processed = process_update_queue(
                slot.base_state.clone(),
                &base_queue,
                cursor.render_lanes,
                |update| skipped |= update.lane,
            );
            cursor.skipped_lanes = skipped;
            processed
        };

        if processed.memoized_state != slot.memoized {
            cursor.did_receive_update = true;
        }
        slot.queue.set_last_rendered_state(processed.memoized_state.clone());

        let next: Rc<dyn Any> = Rc::new(StateSlot {
            memoized: processed.memoized_state.clone(),
            base_state: processed.base_state,
            base_queue: RefCell::new(processed.base_queue),
            queue: slot.queue.clone(),
            dispatch: slot.dispatch.clone(),
        });
        cursor.push(Hook::State(next));
        Ok((processed.memoized_state, slot.dispatch.clone()))
    }

    pub fn use_effect(
        &mut self,
        create: impl FnOnce() -> Option<Cleanup> + 'static,
        deps: Option<Deps>,
    ) -> Result<()> {
        let cursor = &mut self.cursor;
        let index = cursor.index();
        let previous = cursor.next_current()?;
        let Hook::Effect(prev) = &previous else {
            return Err(kind_mismatch(index, "effect", &previous));
        };

        if are_hook_inputs_equal(deps.as_ref(), prev.deps.as_ref()) {
            cursor.push_effect(Rc::new(Effect::new(
                HookFlags::PASSIVE,
                None,
                prev.instance.clone(),
                deps,
            )));
            return Ok(());
        }

        cursor.flags |= Flags::PASSIVE_EFFECT;
        cursor.push_effect(Rc::new(Effect::new(
            HookFlags::HAS_EFFECT | HookFlags::PASSIVE,
            Some(Box::new(create)),
            prev.instance.clone(),
            deps,
        )));
        Ok(())
    }

    pub fn use_memo<T: Clone + 'static>(&mut self, create: impl FnOnce() -> T, deps: Option<Deps>) -> Result<T> {
        let cursor = &mut self.cursor;
        let index = cursor.index();
        let previous = cursor.next_current()?;
        let Hook::Memo { value, deps: prev_deps } = &previous else {
            return Err(kind_mismatch(index, "memo", &previous));
        };

        if are_hook_inputs_equal(deps.as_ref(), prev_deps.as_ref()) {
            let cached = value
                .downcast_ref::<T>()
                .cloned()
                .ok_or(FiberError::HookTypeMismatch { index })?;
            cursor.push(previous.clone());
            return Ok(cached);
        }

        let value = create();
        cursor.push(Hook::Memo {
            value: Rc::new(value.clone()),
            deps,
        });
        Ok(value)
    }

    pub fn use_ref<T: 'static>(&mut self) -> Result<Rc<RefCell<T>>> {
        let cursor = &mut self.cursor;
        let index = cursor.index();
        let previous = cursor.next_current()?;
        let Hook::Ref(erased) = &previous else {
            return Err(kind_mismatch(index, "ref", &previous));
        };
        let cell = erased
            .clone()
            .downcast::<RefCell<T>>()
            .map_err(|_| FiberError::HookTypeMismatch { index })?;
        cursor.push(previous.clone());
        Ok(cell)
    }
}
