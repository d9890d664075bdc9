//! Commit - apply a finished tree to the host in one synchronous pass.
//!
//! # Order
//!
//! 1. Mutation: deletions, then children, then the fiber's own placement,
//!    update, ref detach and visibility change.
//! 2. Swap `root.current` to the finished tree.
//! 3. Layout: attach refs to their instances.
//! 4. Passive effects are queued here and run later, in a scheduled task.

mod passive;

use std::rc::Rc;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::error::Result;
use crate::fiber::{is_hidden, FiberId, FiberRef, Flags, WorkTag};
use crate::host::HostConfig;
use crate::reconciler::{passive_flush_task, EngineState, RenderContext};
use crate::scheduler::Priority;

impl<H: HostConfig> EngineState<H> {
    /// Commit the completed pass. The render context is reset either way.
    pub(crate) fn commit_root(&mut self) -> Result<()> {
        let render = std::mem::replace(&mut self.render, RenderContext::idle());
        let Some(finished) = render.wip_root else {
            return Ok(());
        };
        let lane = render.lane;

        let root_flags = self.arena[finished].flags | self.arena[finished].subtree_flags;
        debug!(?lane, flags = ?root_flags, "commit");
        self.root.mark_finished(lane, render.interleaved_lanes);

        if root_flags.intersects(Flags::PASSIVE_MASK) && !self.root.passive_scheduled {
            self.root.passive_scheduled = true;
            self.scheduler
                .add_task(Priority::Normal, passive_flush_task(self.engine.clone()));
        }

        let mutation = self.commit_mutation_effects_on(finished);
        if mutation.is_ok() {
            self.root.current = finished;
            self.commit_layout_effects_on(finished);
            self.root.commit_count += 1;
            self.root.last_commit_flags = root_flags;
        }
        self.release_detached(render.fresh);
        self.ensure_root_is_scheduled();
        mutation
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    fn commit_mutation_effects_on(&mut self, fiber: FiberRef) -> Result<()> {
        let deletions = std::mem::take(&mut self.arena[fiber].deletions);
        for deleted in deletions {
            self.commit_deletion(fiber, deleted)?;
        }

        if self.arena[fiber]
            .subtree_flags
            .intersects(Flags::MUTATION_MASK | Flags::PASSIVE_MASK)
        {
            for child in self.arena.children(fiber) {
                self.commit_mutation_effects_on(child)?;
            }
        }

        let flags = self.arena[fiber].flags;
        if flags.contains(Flags::PLACEMENT) {
            self.commit_placement(fiber)?;
        }
        if flags.contains(Flags::UPDATE) {
            self.commit_update(fiber)?;
        }
        if flags.contains(Flags::REF) {
            if let Some(current) = self.arena.alternate(fiber) {
                if let Some(old) = &self.arena[current].node_ref {
                    old.detach();
                }
            }
        }
        if flags.contains(Flags::VISIBILITY) && self.arena[fiber].tag == WorkTag::Offscreen {
            let hidden = is_hidden(&self.arena[fiber].memoized_props);
            self.hide_or_unhide_children(fiber, hidden)?;
        }
        if flags.contains(Flags::PASSIVE_EFFECT) {
            if let Some(effects) = self.arena[fiber].update_queue.effects() {
                let effects = effects.clone();
                self.root.pending_passive.update.push(effects);
            }
        }

        let node = &mut self.arena[fiber];
        node.flags &= Flags::LAYOUT_MASK;
        node.subtree_flags &= Flags::LAYOUT_MASK;
        Ok(())
    }

    fn commit_update(&mut self, fiber: FiberRef) -> Result<()> {
        let Some(instance) = self.arena[fiber].state_node.clone() else {
            return Ok(());
        };
        let new_props = self.arena[fiber].memoized_props.clone();
        let old_props = match self.arena.alternate(fiber) {
            Some(current) => self.arena[current].memoized_props.clone(),
            None => new_props.clone(),
        };
        match self.arena[fiber].tag {
            WorkTag::HostComponent => {
                let kind = self.arena[fiber].host_kind().to_owned();
                self.host.commit_update(&instance, &kind, &old_props, &new_props)
            }
            WorkTag::HostText => self
                .host
                .commit_text_update(&instance, old_props.content(), new_props.content()),
            _ => Ok(()),
        }
    }

    /// Nearest host instance at or above `fiber`; the container at the root.
    fn host_parent_of(&self, fiber: FiberRef) -> Option<H::Instance> {
        let mut next = Some(fiber);
        while let Some(node) = next {
            match self.arena[node].tag {
                WorkTag::HostComponent => return self.arena[node].state_node.clone(),
                WorkTag::HostRoot => return Some(self.root.container.clone()),
                _ => next = self.arena[node].ret,
            }
        }
        None
    }

    /// First host instance after `fiber` that is already in place.
    fn host_sibling_of(&mut self, fiber: FiberRef) -> Option<H::Instance> {
        let mut node = fiber;
        'siblings: loop {
            let sibling = loop {
                if let Some(sibling) = self.arena[node].sibling {
                    break sibling;
                }
                match self.arena[node].ret {
                    Some(parent) if !self.arena[parent].tag.is_host_parent() => node = parent,
                    _ => return None,
                }
            };
            let ret = self.arena[node].ret;
            self.arena[sibling].ret = ret;
            node = sibling;

            while !self.arena[node].tag.is_host() {
                if self.arena[node].flags.contains(Flags::PLACEMENT) {
                    continue 'siblings;
                }
                let Some(child) = self.arena[node].child else {
                    continue 'siblings;
                };
                self.arena[child].ret = Some(node);
                node = child;
            }
            if !self.arena[node].flags.contains(Flags::PLACEMENT) {
                return self.arena[node].state_node.clone();
            }
        }
    }

    fn commit_placement(&mut self, fiber: FiberRef) -> Result<()> {
        let Some(parent) = self.arena[fiber].ret.and_then(|ret| self.host_parent_of(ret)) else {
            return Ok(());
        };
        let before = self.host_sibling_of(fiber);
        trace!(fiber = ?fiber.id, moved = self.arena.alternate(fiber).is_some(), "placement");
        self.insert_or_append(fiber, before.as_ref(), &parent)
    }

    fn insert_or_append(&mut self, fiber: FiberRef, before: Option<&H::Instance>, parent: &H::Instance) -> Result<()> {
        if self.arena[fiber].tag.is_host() {
            let Some(instance) = self.arena[fiber].state_node.clone() else {
                return Ok(());
            };
            return match before {
                Some(before) => self.host.insert_before(parent, &instance, before),
                None => self.host.append_child(parent, &instance),
            };
        }
        for child in self.arena.children(fiber) {
            self.insert_or_append(child, before, parent)?;
        }
        Ok(())
    }

    fn hide_or_unhide_children(&mut self, offscreen: FiberRef, hidden: bool) -> Result<()> {
        for child in self.arena.children(offscreen) {
            self.hide_or_unhide(child, hidden)?;
        }
        Ok(())
    }

    /// Toggle the topmost host nodes under `fiber`. A nested hidden
    /// offscreen keeps its own state.
    fn hide_or_unhide(&mut self, fiber: FiberRef, hidden: bool) -> Result<()> {
        let node = &self.arena[fiber];
        match node.tag {
            WorkTag::HostComponent => {
                let Some(instance) = node.state_node.clone() else {
                    return Ok(());
                };
                if hidden {
                    self.host.hide_instance(&instance)
                } else {
                    let props = node.memoized_props.clone();
                    self.host.unhide_instance(&instance, &props)
                }
            }
            WorkTag::HostText => {
                let Some(instance) = node.state_node.clone() else {
                    return Ok(());
                };
                if hidden {
                    self.host.hide_text_instance(&instance)
                } else {
                    let content = node.memoized_props.content().to_owned();
                    self.host.unhide_text_instance(&instance, &content)
                }
            }
            WorkTag::Offscreen if is_hidden(&node.memoized_props) => Ok(()),
            _ => {
                for child in self.arena.children(fiber) {
                    self.hide_or_unhide(child, hidden)?;
                }
                Ok(())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Deletion
    // -------------------------------------------------------------------------

    /// Detach `deleted` from the host and release its slots. Effect
    /// cleanups are queued for the passive flush.
    fn commit_deletion(&mut self, parent: FiberRef, deleted: FiberRef) -> Result<()> {
        let host_parent = self.host_parent_of(parent);
        self.commit_deletion_effects(deleted, host_parent.as_ref(), true)?;
        let slots: Vec<FiberId> = self.arena.subtree(deleted).into_iter().map(|f| f.id).collect();
        trace!(count = slots.len(), "releasing deleted fibers");
        for id in slots {
            self.arena.free(id);
        }
        Ok(())
    }

    fn commit_deletion_effects(
        &mut self,
        fiber: FiberRef,
        host_parent: Option<&H::Instance>,
        remove_host: bool,
    ) -> Result<()> {
        let tag = self.arena[fiber].tag;
        match tag {
            WorkTag::HostComponent | WorkTag::HostText => {
                if let Some(node_ref) = &self.arena[fiber].node_ref {
                    node_ref.detach();
                }
                // descendants leave together with this node
                for child in self.arena.children(fiber) {
                    self.commit_deletion_effects(child, host_parent, false)?;
                }
                if remove_host {
                    if let (Some(parent), Some(instance)) = (host_parent, self.arena[fiber].state_node.clone()) {
                        self.host.remove_child(parent, &instance)?;
                    }
                }
            }
            WorkTag::FunctionComponent | WorkTag::Memo => {
                if let Some(effects) = self.arena[fiber].update_queue.effects() {
                    let effects = effects.clone();
                    self.root.pending_passive.unmount.push(effects);
                }
                for child in self.arena.children(fiber) {
                    self.commit_deletion_effects(child, host_parent, remove_host)?;
                }
            }
            _ => {
                for child in self.arena.children(fiber) {
                    self.commit_deletion_effects(child, host_parent, remove_host)?;
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Layout
    // -------------------------------------------------------------------------

    fn commit_layout_effects_on(&mut self, fiber: FiberRef) {
        if self.arena[fiber].subtree_flags.intersects(Flags::LAYOUT_MASK) {
            for child in self.arena.children(fiber) {
                self.commit_layout_effects_on(child);
            }
        }
        let node = &mut self.arena[fiber];
        if node.flags.contains(Flags::REF) && node.tag == WorkTag::HostComponent {
            if let (Some(node_ref), Some(instance)) = (&node.node_ref, &node.state_node) {
                node_ref.attach(Rc::new(instance.clone()));
            }
        }
        node.flags.remove(Flags::LAYOUT_MASK);
        node.subtree_flags.remove(Flags::LAYOUT_MASK);
    }

    /// Free slots the pass allocated that did not end up in the tree.
    fn release_detached(&mut self, fresh: Vec<FiberId>) {
        if fresh.is_empty() {
            return;
        }
        let live: FxHashSet<FiberId> = self
            .arena
            .subtree(self.root.current)
            .into_iter()
            .map(|f| f.id)
            .collect();
        for id in fresh {
            if !live.contains(&id) {
                self.arena.free(id);
            }
        }
    }
}
