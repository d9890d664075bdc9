//! Generation-indexed fiber storage.
//!
//! Every fiber identity owns one slot with room for two generations. The
//! committed tree lives in one generation and the work-in-progress copy in
//! the other, so a fiber's alternate is simply the other half of its slot:
//!
//! ```text
//!   slot (FiberId)
//!   ├── gens[0]: FiberNode   ◄── FiberRef { id, generation: 0 }
//!   └── gens[1]: FiberNode   ◄── FiberRef { id, generation: 1 }  = alternate
//! ```
//!
//! Committing a render swaps which [`FiberRef`] the root points at; no
//! pointers are rewritten.

use std::ops::{Index, IndexMut};

use slotmap::SlotMap;

use super::node::FiberNode;
use crate::element::Props;
use crate::host::HostConfig;
use crate::lanes::{Lane, Lanes};

slotmap::new_key_type! {
    /// Identity of a fiber, shared by both of its generations.
    pub struct FiberId;
}

/// One generation of one fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiberRef {
    pub id: FiberId,
    pub generation: u8,
}

impl FiberRef {
    /// The other generation of the same slot.
    pub fn flipped(self) -> FiberRef {
        FiberRef {
            id: self.id,
            generation: self.generation ^ 1,
        }
    }
}

struct Slot<H: HostConfig> {
    gens: [Option<FiberNode<H>>; 2],
}

pub(crate) struct FiberArena<H: HostConfig> {
    slots: SlotMap<FiberId, Slot<H>>,
}

impl<H: HostConfig> Default for FiberArena<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HostConfig> FiberArena<H> {
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }

    /// Store `node` in a fresh slot, generation 0.
    pub fn alloc(&mut self, node: FiberNode<H>) -> FiberRef {
        let id = self.slots.insert(Slot {
            gens: [Some(node), None],
        });
        FiberRef { id, generation: 0 }
    }

    pub fn get(&self, fiber: FiberRef) -> Option<&FiberNode<H>> {
        self.slots.get(fiber.id)?.gens[usize::from(fiber.generation)].as_ref()
    }

    pub fn get_mut(&mut self, fiber: FiberRef) -> Option<&mut FiberNode<H>> {
        self.slots.get_mut(fiber.id)?.gens[usize::from(fiber.generation)].as_mut()
    }

    pub fn contains(&self, fiber: FiberRef) -> bool {
        self.get(fiber).is_some()
    }

    pub fn contains_id(&self, id: FiberId) -> bool {
        self.slots.contains_key(id)
    }

    /// The other generation, if it has ever been created.
    pub fn alternate(&self, fiber: FiberRef) -> Option<FiberRef> {
        let other = fiber.flipped();
        self.contains(other).then_some(other)
    }

    /// Any live generation of a slot.
    pub fn any_gen(&self, id: FiberId) -> Option<&FiberNode<H>> {
        let slot = self.slots.get(id)?;
        slot.gens[0].as_ref().or(slot.gens[1].as_ref())
    }

    /// Derive the work-in-progress copy of `current` in the other generation.
    ///
    /// Effect bookkeeping starts empty; everything else is carried over so
    /// a bailout can reuse it unchanged.
    pub fn create_work_in_progress(&mut self, current: FiberRef, pending_props: Props) -> FiberRef {
        let wip = current.flipped();
        let Some(slot) = self.slots.get_mut(current.id) else {
            return wip;
        };
        let Some(source) = slot.gens[usize::from(current.generation)].as_ref() else {
            return wip;
        };
        let mut node = source.clone();
        node.pending_props = pending_props;
        node.flags = Default::default();
        node.subtree_flags = Default::default();
        node.deletions.clear();
        slot.gens[usize::from(wip.generation)] = Some(node);
        wip
    }

    /// Release a slot and both of its generations.
    pub fn free(&mut self, id: FiberId) {
        self.slots.remove(id);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Add `lane` to `lanes` of both generations.
    pub fn merge_lanes(&mut self, id: FiberId, lane: Lane) {
        if let Some(slot) = self.slots.get_mut(id) {
            for node in slot.gens.iter_mut().flatten() {
                node.lanes |= lane;
            }
        }
    }

    /// Add `lane` to `child_lanes` of both generations.
    pub fn merge_child_lanes(&mut self, id: FiberId, lane: Lane) {
        if let Some(slot) = self.slots.get_mut(id) {
            for node in slot.gens.iter_mut().flatten() {
                node.child_lanes |= lane;
            }
        }
    }

    /// Whether neither generation has pending lanes.
    pub fn is_idle(&self, id: FiberId) -> bool {
        self.slots.get(id).is_some_and(|slot| {
            slot.gens
                .iter()
                .flatten()
                .all(|node| node.lanes == Lanes::empty())
        })
    }

    /// Children of `fiber` in sibling order.
    pub fn children(&self, fiber: FiberRef) -> Vec<FiberRef> {
        let mut out = Vec::new();
        let mut next = self.get(fiber).and_then(|n| n.child);
        while let Some(child) = next {
            out.push(child);
            next = self.get(child).and_then(|n| n.sibling);
        }
        out
    }

    /// Every fiber of the subtree rooted at `fiber`, in pre-order.
    pub fn subtree(&self, fiber: FiberRef) -> Vec<FiberRef> {
        let mut out = Vec::new();
        let mut stack = vec![fiber];
        while let Some(node) = stack.pop() {
            out.push(node);
            let children = self.children(node);
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

impl<H: HostConfig> Index<FiberRef> for FiberArena<H> {
    type Output = FiberNode<H>;

    fn index(&self, fiber: FiberRef) -> &FiberNode<H> {
        match self.get(fiber) {
            Some(node) => node,
            None => panic!("fiber {fiber:?} is not allocated"),
        }
    }
}

impl<H: HostConfig> IndexMut<FiberRef> for FiberArena<H> {
    fn index_mut(&mut self, fiber: FiberRef) -> &mut FiberNode<H> {
        match self.get_mut(fiber) {
            Some(node) => node,
            None => panic!("fiber {fiber:?} is not allocated"),
        }
    }
}
