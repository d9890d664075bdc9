//! Begin phase - compute a fiber's next children, or prove it can be skipped.

use tracing::trace;

use super::{BeginOutcome, EngineState};
use crate::context::{propagate_context_change, provided_value};
use crate::element::{Component, ElementType, Node, Props};
use crate::error::{Result, Unwind};
use crate::fiber::{
    is_hidden, offscreen_props, FiberNode, FiberRef, FiberUpdateQueue, Flags, MemoizedState, RootState,
    WorkTag,
};
use crate::hooks::{HookCursor, Hooks};
use crate::host::HostConfig;
use crate::lanes::Lanes;
use crate::update_queue::process_update_queue;

impl<H: HostConfig> EngineState<H> {
    pub(super) fn begin_work(&mut self, wip: FiberRef) -> Result<BeginOutcome> {
        let lane = self.render.lane;
        let current = self.arena.alternate(wip);

        self.render.did_receive_update = false;
        if let Some(cur) = current {
            let props_changed = !self.arena[cur].memoized_props.ptr_eq(&self.arena[wip].pending_props);
            if props_changed {
                self.render.did_receive_update = true;
            } else if !self.arena[cur].lanes.intersects(lane)
                && !self.arena[wip].flags.contains(Flags::DID_CAPTURE)
            {
                return self.attempt_early_bailout(cur, wip);
            }
        }

        self.arena[wip].lanes = Lanes::empty();
        match self.arena[wip].tag {
            WorkTag::HostRoot => self.update_host_root(current, wip),
            WorkTag::FunctionComponent => self.update_function_component(current, wip),
            WorkTag::Memo => self.update_memo_component(current, wip),
            WorkTag::HostComponent | WorkTag::Fragment => self.update_children_from_props(current, wip),
            WorkTag::HostText => Ok(BeginOutcome::Continue(None)),
            WorkTag::ContextProvider => self.update_context_provider(current, wip),
            WorkTag::Suspense => self.update_suspense_component(current, wip),
            WorkTag::Offscreen => self.update_offscreen_component(current, wip),
        }
    }

    // -------------------------------------------------------------------------
    // Bailout
    // -------------------------------------------------------------------------

    /// No props change and no own work: keep stacks balanced, then skip or clone.
    fn attempt_early_bailout(&mut self, current: FiberRef, wip: FiberRef) -> Result<BeginOutcome> {
        match self.arena[wip].tag {
            WorkTag::ContextProvider => self.push_provider(wip),
            WorkTag::Suspense => {
                if self.arena[current].memoized_state.showing_fallback() {
                    let primary_has_work = self.arena[current]
                        .child
                        .is_some_and(|primary| self.arena[primary].child_lanes.intersects(self.render.lane));
                    if primary_has_work {
                        // retry the primary children instead of cloning the fallback
                        return self.update_suspense_component(Some(current), wip);
                    }
                    let outer = self.render.nearest_boundary();
                    self.render.suspense_stack.push(outer);
                } else {
                    self.render.suspense_stack.push(Some(wip));
                }
            }
            WorkTag::Offscreen if is_hidden(&self.arena[wip].pending_props) => {
                return Ok(BeginOutcome::Skip);
            }
            _ => {}
        }
        self.bailout_on_already_finished(wip)
    }

    /// Skip this fiber's own work. Children are cloned when they have work.
    pub(super) fn bailout_on_already_finished(&mut self, wip: FiberRef) -> Result<BeginOutcome> {
        if !self.arena[wip].child_lanes.intersects(self.render.lane) {
            trace!(fiber = ?wip.id, "subtree skipped");
            return Ok(BeginOutcome::Skip);
        }
        self.clone_child_fibers(wip);
        Ok(BeginOutcome::Continue(self.arena[wip].child))
    }

    fn clone_child_fibers(&mut self, wip: FiberRef) {
        let mut next = self.arena[wip].child;
        let mut previous: Option<FiberRef> = None;
        while let Some(current_child) = next {
            next = self.arena[current_child].sibling;
            let props = self.arena[current_child].pending_props.clone();
            let child = self.arena.create_work_in_progress(current_child, props);
            self.arena[child].ret = Some(wip);
            match previous {
                None => self.arena[wip].child = Some(child),
                Some(prev) => self.arena[prev].sibling = Some(child),
            }
            previous = Some(child);
        }
        if let Some(last) = previous {
            self.arena[last].sibling = None;
        }
    }

    // -------------------------------------------------------------------------
    // Host root
    // -------------------------------------------------------------------------

    fn update_host_root(&mut self, current: Option<FiberRef>, wip: FiberRef) -> Result<BeginOutcome> {
        let Some(cur) = current else {
            return Ok(BeginOutcome::Continue(None));
        };
        let FiberUpdateQueue::Root(queue) = self.arena[wip].update_queue.clone() else {
            return Ok(BeginOutcome::Continue(None));
        };

        // pending updates move onto the committed state first so a
        // discarded pass does not lose them
        let pending = queue.take_pending();
        let (base_state, base_queue, previous) = match &mut self.arena[cur].memoized_state {
            MemoizedState::Root(state) => {
                state.base_queue.append(pending);
                (state.base_state.clone(), state.base_queue.clone(), state.element.clone())
            }
            _ => (Node::Empty, pending, Node::Empty),
        };

        let mut skipped = Lanes::empty();
        let processed = process_update_queue(base_state, &base_queue, self.render.lane, |update| {
            skipped |= update.lane
        });
        let next = processed.memoized_state.clone();
        let node = &mut self.arena[wip];
        node.lanes |= skipped;
        node.memoized_state = MemoizedState::Root(RootState {
            element: processed.memoized_state,
            base_state: processed.base_state,
            base_queue: processed.base_queue,
        });

        if next.same(&previous) {
            return self.bailout_on_already_finished(wip);
        }
        self.reconcile_children(current, wip, &next);
        Ok(BeginOutcome::Continue(self.arena[wip].child))
    }

    // -------------------------------------------------------------------------
    // Components
    // -------------------------------------------------------------------------

    fn update_function_component(&mut self, current: Option<FiberRef>, wip: FiberRef) -> Result<BeginOutcome> {
        let Some(ElementType::Function(component)) = self.arena[wip].element_type.clone() else {
            return Ok(BeginOutcome::Continue(None));
        };
        self.render_with_hooks(current, wip, &component)
    }

    fn update_memo_component(&mut self, current: Option<FiberRef>, wip: FiberRef) -> Result<BeginOutcome> {
        let Some(ElementType::Memo(memo)) = self.arena[wip].element_type.clone() else {
            return Ok(BeginOutcome::Continue(None));
        };
        if let Some(cur) = current {
            let previous = self.arena[cur].memoized_props.clone();
            let has_work = self.arena[cur].lanes.intersects(self.render.lane);
            if !has_work && memo.props_equal(&previous, &self.arena[wip].pending_props) {
                trace!(component = memo.component().name(), "memo bailout");
                self.render.did_receive_update = false;
                let lanes = self.arena[cur].lanes;
                let node = &mut self.arena[wip];
                node.pending_props = previous;
                node.lanes = lanes;
                return self.bailout_on_already_finished(wip);
            }
        }
        self.render_with_hooks(current, wip, memo.component())
    }

    fn prepare_to_read_context(&mut self, wip: FiberRef) {
        let lane = self.render.lane;
        let dependencies = &mut self.arena[wip].dependencies;
        if dependencies.lanes.intersects(lane) {
            self.render.did_receive_update = true;
        }
        dependencies.lanes &= !lane;
        dependencies.contexts.clear();
    }

    /// Run a component body and reconcile what it returns.
    fn render_with_hooks(
        &mut self,
        current: Option<FiberRef>,
        wip: FiberRef,
        component: &Component,
    ) -> Result<BeginOutcome> {
        self.prepare_to_read_context(wip);
        let props = self.arena[wip].pending_props.clone();
        let current_hooks = current.map(|cur| self.arena[cur].memoized_state.hooks().to_vec());
        trace!(component = component.name(), mount = current_hooks.is_none(), "render");

        let (children, output) = {
            let is_mount = current_hooks.is_none();
            let cursor = HookCursor::new(
                wip.id,
                self.render.lane,
                current_hooks.unwrap_or_default(),
                &self.render.contexts,
                self.sink.clone(),
                &self.scheduler,
            );
            let mut hooks = if is_mount { Hooks::mount(cursor) } else { Hooks::update(cursor) };
            match component.call(&mut hooks, &props) {
                Ok(children) => (children, hooks.finish()?),
                Err(Unwind::Suspend(handle)) => return Ok(BeginOutcome::Suspend(handle)),
                Err(Unwind::Fail(err)) => return Err(err),
            }
        };

        let node = &mut self.arena[wip];
        node.memoized_state = MemoizedState::Hooks(output.hooks);
        node.update_queue = FiberUpdateQueue::Effects(output.effects.into());
        node.flags |= output.flags;
        node.lanes |= output.skipped_lanes;
        node.dependencies.contexts = output.contexts;
        if output.did_receive_update {
            self.render.did_receive_update = true;
        }

        if let Some(cur) = current {
            if !self.render.did_receive_update {
                self.bailout_hooks(cur, wip);
                return self.bailout_on_already_finished(wip);
            }
        }
        self.reconcile_children(current, wip, &children);
        Ok(BeginOutcome::Continue(self.arena[wip].child))
    }

    /// The body ran but nothing it reads changed: keep the committed effects.
    fn bailout_hooks(&mut self, current: FiberRef, wip: FiberRef) {
        let lane = self.render.lane;
        let effects = self.arena[current].update_queue.clone();
        let node = &mut self.arena[wip];
        node.update_queue = effects;
        node.flags.remove(Flags::PASSIVE_EFFECT | Flags::UPDATE);
        self.arena[current].lanes.remove(lane);
    }

    // -------------------------------------------------------------------------
    // Structural fibers
    // -------------------------------------------------------------------------

    fn update_children_from_props(&mut self, current: Option<FiberRef>, wip: FiberRef) -> Result<BeginOutcome> {
        let children = self.arena[wip].pending_props.children().clone();
        self.reconcile_children(current, wip, &children);
        Ok(BeginOutcome::Continue(self.arena[wip].child))
    }

    fn push_provider(&mut self, wip: FiberRef) {
        let node = &self.arena[wip];
        let Some(ElementType::Provider(key)) = node.element_type.clone() else {
            return;
        };
        let value = provided_value(&node.pending_props).unwrap_or_else(|| std::rc::Rc::new(()));
        self.render.contexts.push(key, value);
    }

    fn update_context_provider(&mut self, current: Option<FiberRef>, wip: FiberRef) -> Result<BeginOutcome> {
        let Some(ElementType::Provider(key)) = self.arena[wip].element_type.clone() else {
            return self.update_children_from_props(current, wip);
        };
        self.push_provider(wip);
        let props = self.arena[wip].pending_props.clone();

        if let Some(cur) = current {
            let previous = self.arena[cur].memoized_props.clone();
            let changed = match (provided_value(&previous), provided_value(&props)) {
                (Some(old), Some(new)) => !key.values_equal(&*old, &*new),
                _ => true,
            };
            if changed {
                trace!(context = key.id(), "context value changed");
                propagate_context_change(&mut self.arena, wip, key, self.render.lane);
            } else if previous.children().same(props.children()) {
                return self.bailout_on_already_finished(wip);
            }
        }
        self.reconcile_children(current, wip, props.children());
        Ok(BeginOutcome::Continue(self.arena[wip].child))
    }

    fn update_offscreen_component(&mut self, current: Option<FiberRef>, wip: FiberRef) -> Result<BeginOutcome> {
        if is_hidden(&self.arena[wip].pending_props) {
            return Ok(BeginOutcome::Skip);
        }
        self.update_children_from_props(current, wip)
    }

    // -------------------------------------------------------------------------
    // Suspense
    // -------------------------------------------------------------------------

    /// Render either the primary children or, after a capture, the fallback.
    ///
    /// The primary children always sit under an Offscreen fiber so that
    /// switching to the fallback hides them without losing their state.
    fn update_suspense_component(&mut self, current: Option<FiberRef>, wip: FiberRef) -> Result<BeginOutcome> {
        let show_fallback = self.arena[wip].flags.contains(Flags::DID_CAPTURE);
        self.arena[wip].flags.remove(Flags::DID_CAPTURE);

        let props = self.arena[wip].pending_props.clone();
        let primary_children = props.children().clone();
        let fallback_children = props.node("fallback").cloned().unwrap_or_default();
        self.arena[wip].memoized_state = MemoizedState::Suspense {
            showing_fallback: show_fallback,
        };

        // while the fallback shows, suspensions inside it escape outward
        let entry = if show_fallback { self.render.nearest_boundary() } else { Some(wip) };
        self.render.suspense_stack.push(entry);

        let current_primary = current.and_then(|cur| self.arena[cur].child);
        let current_fallback = current_primary.and_then(|primary| self.arena[primary].sibling);
        let primary_props = offscreen_props(show_fallback, primary_children);
        let primary = match current_primary {
            Some(existing) => self.arena.create_work_in_progress(existing, primary_props),
            None => self.alloc_fiber(FiberNode::offscreen(primary_props)),
        };
        {
            let node = &mut self.arena[primary];
            node.ret = Some(wip);
            node.index = 0;
            node.sibling = None;
        }
        self.arena[wip].child = Some(primary);

        if !show_fallback {
            if let (Some(_), Some(fallback)) = (current, current_fallback) {
                let node = &mut self.arena[wip];
                node.deletions.push(fallback);
                node.flags |= Flags::CHILD_DELETION;
            }
            return Ok(BeginOutcome::Continue(Some(primary)));
        }

        trace!(boundary = ?wip.id, "showing fallback");
        // the hidden primary is not begun in this pass
        let memoized = self.arena[primary].pending_props.clone();
        self.arena[primary].memoized_props = memoized;

        let fallback_props = Props::new().with_children(fallback_children);
        let fallback = match current_fallback {
            Some(existing) => self.arena.create_work_in_progress(existing, fallback_props),
            None => {
                let fallback = self.alloc_fiber(FiberNode::fragment(fallback_props.children().clone()));
                if current.is_some() {
                    self.arena[fallback].flags |= Flags::PLACEMENT;
                }
                fallback
            }
        };
        {
            let node = &mut self.arena[fallback];
            node.ret = Some(wip);
            node.index = 1;
            node.sibling = None;
        }
        self.arena[primary].sibling = Some(fallback);
        Ok(BeginOutcome::Continue(Some(fallback)))
    }
}
