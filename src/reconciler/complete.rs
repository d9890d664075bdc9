//! Complete phase - create host instances and bubble effects upward.

use tracing::trace;

use super::EngineState;
use crate::element::same_ref;
use crate::error::Result;
use crate::fiber::{FiberRef, Flags, WorkTag};
use crate::host::HostConfig;
use crate::lanes::Lanes;

impl<H: HostConfig> EngineState<H> {
    pub(super) fn complete_work(&mut self, wip: FiberRef) -> Result<()> {
        let current = self.arena.alternate(wip);
        match self.arena[wip].tag {
            WorkTag::HostComponent => self.complete_host_component(current, wip)?,
            WorkTag::HostText => self.complete_host_text(current, wip)?,
            WorkTag::ContextProvider => self.render.contexts.pop(),
            WorkTag::Suspense => self.complete_suspense(current, wip),
            WorkTag::HostRoot
            | WorkTag::FunctionComponent
            | WorkTag::Memo
            | WorkTag::Fragment
            | WorkTag::Offscreen => {}
        }
        self.bubble_properties(wip);
        Ok(())
    }

    fn complete_host_component(&mut self, current: Option<FiberRef>, wip: FiberRef) -> Result<()> {
        let existing = current.filter(|_| self.arena[wip].state_node.is_some());
        if let Some(cur) = existing {
            let old = &self.arena[cur];
            let new = &self.arena[wip];
            let changed = !old.memoized_props.attrs_eq(&new.memoized_props);
            let ref_changed = !same_ref(old.node_ref.as_ref(), new.node_ref.as_ref());
            let node = &mut self.arena[wip];
            if changed {
                node.flags |= Flags::UPDATE;
            }
            if ref_changed {
                node.flags |= Flags::REF;
            }
            return Ok(());
        }

        let node = &self.arena[wip];
        let kind = node.host_kind().to_owned();
        let props = node.memoized_props.clone();
        let instance = self.host.create_instance(&kind, &props)?;
        trace!(kind = %kind, ?instance, "created instance");
        self.append_all_children(&instance, wip)?;
        let node = &mut self.arena[wip];
        node.state_node = Some(instance);
        if node.node_ref.is_some() {
            node.flags |= Flags::REF;
        }
        Ok(())
    }

    fn complete_host_text(&mut self, current: Option<FiberRef>, wip: FiberRef) -> Result<()> {
        let existing = current.filter(|_| self.arena[wip].state_node.is_some());
        if let Some(cur) = existing {
            if self.arena[cur].memoized_props.content() != self.arena[wip].memoized_props.content() {
                self.arena[wip].flags |= Flags::UPDATE;
            }
            return Ok(());
        }
        let content = self.arena[wip].memoized_props.content().to_owned();
        let instance = self.host.create_text_instance(&content)?;
        self.arena[wip].state_node = Some(instance);
        Ok(())
    }

    /// Attach the nearest host descendants of `fiber` to a detached `parent`.
    fn append_all_children(&mut self, parent: &H::Instance, fiber: FiberRef) -> Result<()> {
        for child in self.arena.children(fiber) {
            if self.arena[child].tag.is_host() {
                if let Some(instance) = self.arena[child].state_node.clone() {
                    self.host.append_initial_child(parent, &instance)?;
                }
            } else {
                self.append_all_children(parent, child)?;
            }
        }
        Ok(())
    }

    fn complete_suspense(&mut self, current: Option<FiberRef>, wip: FiberRef) {
        self.render.suspense_stack.pop();
        let Some(cur) = current else {
            return;
        };
        let was_showing = self.arena[cur].memoized_state.showing_fallback();
        let showing = self.arena[wip].memoized_state.showing_fallback();
        if was_showing == showing {
            return;
        }
        // nothing to unhide when the boundary mounted straight into its fallback
        let had_primary_content = self.arena[cur]
            .child
            .is_some_and(|primary| self.arena[primary].child.is_some());
        if let Some(primary) = self.arena[wip].child {
            if showing || had_primary_content {
                self.arena[primary].flags |= Flags::VISIBILITY;
            }
        }
    }

    /// Fold children's flags and lanes into `wip`.
    pub(super) fn bubble_properties(&mut self, wip: FiberRef) {
        let mut subtree_flags = Flags::empty();
        let mut child_lanes = Lanes::empty();
        for child in self.arena.children(wip) {
            let node = &mut self.arena[child];
            subtree_flags |= node.subtree_flags | node.flags;
            child_lanes |= node.lanes | node.child_lanes;
            node.ret = Some(wip);
        }
        let node = &mut self.arena[wip];
        node.subtree_flags |= subtree_flags;
        node.child_lanes = child_lanes;
    }
}
