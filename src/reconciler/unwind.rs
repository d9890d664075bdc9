//! Suspension handling - find the catching boundary and arrange a retry.

use tracing::debug;

use super::{EngineState, Request, RootExitStatus};
use crate::fiber::{FiberId, FiberRef, Flags, WorkTag};
use crate::host::HostConfig;
use crate::thenable::SuspendHandle;

impl<H: HostConfig> EngineState<H> {
    /// `unit` suspended on `handle`. Resume at the catching boundary, or end
    /// the pass when nothing catches it.
    pub(super) fn throw_exception(&mut self, unit: FiberRef, handle: SuspendHandle) {
        let lane = self.render.lane;
        let boundary = self.render.nearest_boundary();
        self.attach_ping_listener(&handle, boundary.map(|b| b.id));

        let Some(boundary) = boundary else {
            debug!(?lane, "suspended outside any boundary");
            self.render.work_in_progress = None;
            self.render.exit = RootExitStatus::DidNotComplete;
            return;
        };
        debug!(?lane, boundary = ?boundary.id, "suspended; showing fallback");
        self.arena[boundary].flags |= Flags::SHOULD_CAPTURE;
        self.render.work_in_progress = self.unwind_to_boundary(unit);
        if self.render.work_in_progress.is_none() {
            self.render.exit = RootExitStatus::DidNotComplete;
        }
    }

    /// Walk up from `unit`, popping stacks, until the flagged boundary.
    fn unwind_to_boundary(&mut self, unit: FiberRef) -> Option<FiberRef> {
        let mut next = self.arena[unit].ret;
        while let Some(fiber) = next {
            match self.arena[fiber].tag {
                WorkTag::ContextProvider => self.render.contexts.pop(),
                WorkTag::Suspense => {
                    self.render.suspense_stack.pop();
                    if self.arena[fiber].flags.contains(Flags::SHOULD_CAPTURE) {
                        let node = &mut self.arena[fiber];
                        node.flags.remove(Flags::SHOULD_CAPTURE | Flags::CHILD_DELETION);
                        node.flags |= Flags::DID_CAPTURE;
                        node.subtree_flags = Flags::empty();
                        node.deletions.clear();
                        return Some(fiber);
                    }
                }
                _ => {}
            }
            let node = &mut self.arena[fiber];
            node.subtree_flags = Flags::empty();
            node.deletions.clear();
            node.flags.remove(Flags::CHILD_DELETION);
            next = node.ret;
        }
        None
    }

    /// Retry the boundary (or the root) once `handle` settles. One listener
    /// per awaitable and lane.
    fn attach_ping_listener(&mut self, handle: &SuspendHandle, target: Option<FiberId>) {
        let lane = self.render.lane;
        let wakeable = handle.id();
        let attached = self.root.ping_cache.entry(wakeable).or_default();
        if attached.contains(lane) {
            return;
        }
        *attached |= lane;

        let engine = self.engine.clone();
        handle.on_settle(Box::new(move || {
            if let Some(cell) = engine.upgrade() {
                cell.push(Request::Ping { wakeable, target, lane });
            }
        }));
    }
}
