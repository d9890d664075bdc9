//! Root bookkeeping: which generation is committed and which lanes are pending.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::{FiberArena, FiberNode, FiberRef, Flags};
use crate::hooks::Effect;
use crate::host::HostConfig;
use crate::lanes::{Lane, Lanes, NO_LANE};
use crate::scheduler::TaskHandle;

/// Effect lists waiting for the passive flush.
#[derive(Default)]
pub(crate) struct PendingPassive {
    /// Lists of deleted components: destroys only.
    pub unmount: Vec<Rc<[Rc<Effect>]>>,
    /// Lists of components whose effects changed.
    pub update: Vec<Rc<[Rc<Effect>]>>,
}

impl PendingPassive {
    pub fn is_empty(&self) -> bool {
        self.unmount.is_empty() && self.update.is_empty()
    }
}

pub(crate) struct FiberRoot<H: HostConfig> {
    pub container: H::Instance,
    /// HostRoot fiber of the committed tree.
    pub current: FiberRef,
    pub pending_lanes: Lanes,
    /// Lanes whose last render suspended outside any boundary.
    pub suspended_lanes: Lanes,
    pub callback_node: Option<TaskHandle>,
    pub callback_priority: Lane,
    /// Wakeable id to the lanes already waiting on it.
    pub ping_cache: FxHashMap<usize, Lanes>,
    pub pending_passive: PendingPassive,
    pub passive_scheduled: bool,
    pub commit_count: usize,
    pub last_commit_flags: Flags,
}

impl<H: HostConfig> FiberRoot<H> {
    /// Root over `container` with an empty HostRoot fiber in `arena`.
    pub fn new(arena: &mut FiberArena<H>, container: H::Instance) -> Self {
        let current = arena.alloc(FiberNode::host_root(container.clone()));
        Self {
            container,
            current,
            pending_lanes: Lanes::empty(),
            suspended_lanes: Lanes::empty(),
            callback_node: None,
            callback_priority: NO_LANE,
            ping_cache: FxHashMap::default(),
            pending_passive: PendingPassive::default(),
            passive_scheduled: false,
            commit_count: 0,
            last_commit_flags: Flags::empty(),
        }
    }

    /// Most urgent lane that can render now.
    pub fn next_lane(&self) -> Lane {
        (self.pending_lanes & !self.suspended_lanes).highest()
    }

    pub fn mark_updated(&mut self, lane: Lane) {
        self.pending_lanes |= lane;
        self.suspended_lanes = Lanes::empty();
    }

    pub fn mark_suspended(&mut self, lane: Lane) {
        self.suspended_lanes |= lane;
    }

    pub fn mark_pinged(&mut self, lane: Lane) {
        self.suspended_lanes &= !lane;
    }

    /// Drop `lane` from pending, keeping lanes that arrived during the render.
    pub fn mark_finished(&mut self, lane: Lane, interleaved: Lanes) {
        self.pending_lanes = (self.pending_lanes & !lane) | interleaved;
        self.suspended_lanes &= self.pending_lanes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::NoopHost;

    #[test]
    fn test_suspended_lanes_are_skipped_until_pinged() {
        let mut arena = FiberArena::<NoopHost>::new();
        let host = NoopHost::new();
        let mut root = FiberRoot::new(&mut arena, host.container());

        root.mark_updated(Lanes::DEFAULT | Lanes::TRANSITION);
        assert_eq!(root.next_lane(), Lanes::DEFAULT);
        root.mark_suspended(Lanes::DEFAULT);
        assert_eq!(root.next_lane(), Lanes::TRANSITION);
        root.mark_pinged(Lanes::DEFAULT);
        assert_eq!(root.next_lane(), Lanes::DEFAULT);

        root.mark_finished(Lanes::DEFAULT, Lanes::SYNC);
        assert_eq!(root.pending_lanes, Lanes::TRANSITION | Lanes::SYNC);
    }
}
