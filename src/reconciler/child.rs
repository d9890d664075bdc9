//! Child differ - matches new children against the current child list.
//!
//! Single children match by key then type. Lists run the two-pass scheme:
//! walk both lists in lockstep while slots line up, then index the rest of
//! the old list by key and look each new child up. A reused fiber whose old
//! position is left of the rightmost kept position moves; everything else
//! stays put. New fibers are placed, leftovers are deleted.
//!
//! With `track` off (mounting under a fresh parent) no flags are recorded:
//! the whole subtree is attached at once by the nearest placed ancestor.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use super::EngineState;
use crate::element::{Element, Key, Node, Props};
use crate::fiber::{FiberNode, FiberRef, Flags, WorkTag};
use crate::host::HostConfig;

/// How an old child is looked up in the second pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChildKey {
    Explicit(Key),
    Implicit(usize),
}

/// Expand nested lists in place. Empty entries keep their index as holes.
fn flatten_children(items: &[Node], out: &mut Vec<Node>) {
    for item in items {
        match item {
            Node::List(inner) => flatten_children(inner, out),
            other => out.push(other.clone()),
        }
    }
}

impl<H: HostConfig> EngineState<H> {
    /// Diff `children` against the current children of `wip` and link the result.
    pub(super) fn reconcile_children(&mut self, current: Option<FiberRef>, wip: FiberRef, children: &Node) {
        let current_first = current.and_then(|c| self.arena[c].child);
        let first = self.reconcile_child_fibers(wip, current_first, children, current.is_some());
        self.arena[wip].child = first;
    }

    fn reconcile_child_fibers(
        &mut self,
        parent: FiberRef,
        current_first: Option<FiberRef>,
        children: &Node,
        track: bool,
    ) -> Option<FiberRef> {
        match children {
            Node::Element(element) => {
                let fiber = self.reconcile_single_element(parent, current_first, element, track);
                Some(self.place_single_child(fiber, track))
            }
            Node::Text(content) => {
                let fiber = self.reconcile_single_text(parent, current_first, content, track);
                Some(self.place_single_child(fiber, track))
            }
            Node::List(items) => {
                let mut flat = Vec::with_capacity(items.len());
                flatten_children(items, &mut flat);
                self.reconcile_children_array(parent, current_first, &flat, track)
            }
            Node::Empty => {
                self.delete_remaining_children(parent, current_first, track);
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Deletion
    // -------------------------------------------------------------------------

    fn delete_child(&mut self, parent: FiberRef, child: FiberRef, track: bool) {
        if !track {
            return;
        }
        let node = &mut self.arena[parent];
        node.deletions.push(child);
        node.flags |= Flags::CHILD_DELETION;
    }

    fn delete_remaining_children(&mut self, parent: FiberRef, first: Option<FiberRef>, track: bool) {
        if !track {
            return;
        }
        let mut next = first;
        while let Some(child) = next {
            self.delete_child(parent, child, track);
            next = self.arena[child].sibling;
        }
    }

    // -------------------------------------------------------------------------
    // Fiber reuse and creation
    // -------------------------------------------------------------------------

    /// Work-in-progress copy of `current` as an only child.
    fn use_fiber(&mut self, current: FiberRef, props: Props, parent: FiberRef) -> FiberRef {
        let fiber = self.arena.create_work_in_progress(current, props);
        let node = &mut self.arena[fiber];
        node.index = 0;
        node.sibling = None;
        node.ret = Some(parent);
        fiber
    }

    fn create_from_element(&mut self, parent: FiberRef, element: &Element) -> FiberRef {
        let fiber = self.alloc_fiber(FiberNode::from_element(element));
        self.arena[fiber].ret = Some(parent);
        fiber
    }

    fn create_text(&mut self, parent: FiberRef, content: &str) -> FiberRef {
        let fiber = self.alloc_fiber(FiberNode::text(content));
        self.arena[fiber].ret = Some(parent);
        fiber
    }

    fn update_element(&mut self, parent: FiberRef, current: Option<FiberRef>, element: &Element) -> FiberRef {
        match current {
            Some(existing) if self.arena[existing].is_type(element.element_type()) => {
                let fiber = self.use_fiber(existing, element.props().clone(), parent);
                self.arena[fiber].node_ref = element.node_ref().cloned();
                fiber
            }
            _ => self.create_from_element(parent, element),
        }
    }

    fn update_text(&mut self, parent: FiberRef, current: Option<FiberRef>, content: &str) -> FiberRef {
        match current {
            Some(existing) if self.arena[existing].tag == WorkTag::HostText => {
                self.use_fiber(existing, Props::text(content), parent)
            }
            _ => self.create_text(parent, content),
        }
    }

    fn create_child(&mut self, parent: FiberRef, item: &Node) -> Option<FiberRef> {
        match item {
            Node::Element(element) => Some(self.create_from_element(parent, element)),
            Node::Text(content) => Some(self.create_text(parent, content)),
            Node::Empty | Node::List(_) => None,
        }
    }

    // -------------------------------------------------------------------------
    // Single child
    // -------------------------------------------------------------------------

    fn reconcile_single_element(
        &mut self,
        parent: FiberRef,
        current_first: Option<FiberRef>,
        element: &Element,
        track: bool,
    ) -> FiberRef {
        let key = element.key();
        let mut next = current_first;
        while let Some(child) = next {
            if self.arena[child].key.as_ref() == key {
                if self.arena[child].is_type(element.element_type()) {
                    let sibling = self.arena[child].sibling;
                    self.delete_remaining_children(parent, sibling, track);
                    let fiber = self.use_fiber(child, element.props().clone(), parent);
                    self.arena[fiber].node_ref = element.node_ref().cloned();
                    return fiber;
                }
                // same key, different type: nothing after it can match either
                self.delete_remaining_children(parent, Some(child), track);
                break;
            }
            self.delete_child(parent, child, track);
            next = self.arena[child].sibling;
        }
        self.create_from_element(parent, element)
    }

    fn reconcile_single_text(
        &mut self,
        parent: FiberRef,
        current_first: Option<FiberRef>,
        content: &str,
        track: bool,
    ) -> FiberRef {
        if let Some(first) = current_first {
            if self.arena[first].tag == WorkTag::HostText {
                let sibling = self.arena[first].sibling;
                self.delete_remaining_children(parent, sibling, track);
                return self.use_fiber(first, Props::text(content), parent);
            }
        }
        self.delete_remaining_children(parent, current_first, track);
        self.create_text(parent, content)
    }

    fn place_single_child(&mut self, fiber: FiberRef, track: bool) -> FiberRef {
        if track && self.arena.alternate(fiber).is_none() {
            self.arena[fiber].flags |= Flags::PLACEMENT;
        }
        fiber
    }

    // -------------------------------------------------------------------------
    // Lists
    // -------------------------------------------------------------------------

    /// Record `fiber` at `new_index`, flag it if it moves, and return the
    /// rightmost old position kept so far.
    fn place_child(&mut self, fiber: FiberRef, last_placed: usize, new_index: usize, track: bool) -> usize {
        self.arena[fiber].index = new_index;
        if !track {
            return last_placed;
        }
        match self.arena.alternate(fiber) {
            Some(current) => {
                let old_index = self.arena[current].index;
                if old_index < last_placed {
                    self.arena[fiber].flags |= Flags::PLACEMENT;
                    last_placed
                } else {
                    old_index
                }
            }
            None => {
                self.arena[fiber].flags |= Flags::PLACEMENT;
                last_placed
            }
        }
    }

    /// Reuse `old` for `item` if their keys agree, else `None`.
    fn update_slot(&mut self, parent: FiberRef, old: Option<FiberRef>, item: &Node) -> Option<FiberRef> {
        let old_key = old.and_then(|o| self.arena[o].key.clone());
        match item {
            Node::Text(content) => {
                if old_key.is_some() {
                    return None;
                }
                Some(self.update_text(parent, old, content))
            }
            Node::Element(element) => {
                if element.key() != old_key.as_ref() {
                    return None;
                }
                Some(self.update_element(parent, old, element))
            }
            Node::Empty | Node::List(_) => None,
        }
    }

    fn update_from_map(
        &mut self,
        existing: &FxHashMap<ChildKey, FiberRef>,
        parent: FiberRef,
        new_index: usize,
        item: &Node,
    ) -> Option<FiberRef> {
        match item {
            Node::Text(content) => {
                let matched = existing.get(&ChildKey::Implicit(new_index)).copied();
                Some(self.update_text(parent, matched, content))
            }
            Node::Element(element) => {
                let key = element
                    .key()
                    .map_or(ChildKey::Implicit(new_index), |k| ChildKey::Explicit(k.clone()));
                let matched = existing.get(&key).copied();
                Some(self.update_element(parent, matched, element))
            }
            Node::Empty | Node::List(_) => None,
        }
    }

    fn map_remaining_children(&self, first: Option<FiberRef>) -> FxHashMap<ChildKey, FiberRef> {
        let mut existing = FxHashMap::default();
        let mut next = first;
        while let Some(child) = next {
            let node = &self.arena[child];
            let key = match &node.key {
                Some(key) => ChildKey::Explicit(key.clone()),
                None => ChildKey::Implicit(node.index),
            };
            existing.insert(key, child);
            next = node.sibling;
        }
        existing
    }

    fn link_child(&mut self, first: &mut Option<FiberRef>, previous: &mut Option<FiberRef>, fiber: FiberRef) {
        match *previous {
            None => *first = Some(fiber),
            Some(prev) => self.arena[prev].sibling = Some(fiber),
        }
        *previous = Some(fiber);
    }

    fn reconcile_children_array(
        &mut self,
        parent: FiberRef,
        current_first: Option<FiberRef>,
        items: &[Node],
        track: bool,
    ) -> Option<FiberRef> {
        warn_on_duplicate_keys(items);

        let mut first = None;
        let mut previous = None;
        let mut last_placed = 0;
        let mut new_index = 0;
        let mut old = current_first;

        // pass one: positions line up
        while let Some(old_fiber) = old {
            if new_index >= items.len() {
                break;
            }
            let (slot_old, next_old) = if self.arena[old_fiber].index > new_index {
                (None, Some(old_fiber))
            } else {
                (Some(old_fiber), self.arena[old_fiber].sibling)
            };
            let Some(fiber) = self.update_slot(parent, slot_old, &items[new_index]) else {
                break;
            };
            if let Some(replaced) = slot_old {
                if self.arena.alternate(fiber).is_none() {
                    self.delete_child(parent, replaced, track);
                }
            }
            last_placed = self.place_child(fiber, last_placed, new_index, track);
            self.link_child(&mut first, &mut previous, fiber);
            old = next_old;
            new_index += 1;
        }

        if new_index == items.len() {
            self.delete_remaining_children(parent, old, track);
            return first;
        }

        if old.is_none() {
            for (index, item) in items.iter().enumerate().skip(new_index) {
                if let Some(fiber) = self.create_child(parent, item) {
                    last_placed = self.place_child(fiber, last_placed, index, track);
                    self.link_child(&mut first, &mut previous, fiber);
                }
            }
            return first;
        }

        // pass two: look the rest up by key
        let mut existing = self.map_remaining_children(old);
        for (index, item) in items.iter().enumerate().skip(new_index) {
            let Some(fiber) = self.update_from_map(&existing, parent, index, item) else {
                continue;
            };
            if track && self.arena.alternate(fiber).is_some() {
                let key = match &self.arena[fiber].key {
                    Some(key) => ChildKey::Explicit(key.clone()),
                    None => ChildKey::Implicit(index),
                };
                existing.remove(&key);
            }
            last_placed = self.place_child(fiber, last_placed, index, track);
            self.link_child(&mut first, &mut previous, fiber);
        }

        if track {
            let mut leftovers: Vec<FiberRef> = existing.into_values().collect();
            leftovers.sort_by_key(|fiber| self.arena[*fiber].index);
            for fiber in leftovers {
                self.delete_child(parent, fiber, track);
            }
        }
        first
    }
}

fn warn_on_duplicate_keys(items: &[Node]) {
    let mut seen: FxHashSet<&Key> = FxHashSet::default();
    for item in items {
        if let Node::Element(element) = item {
            if let Some(key) = element.key() {
                if !seen.insert(key) {
                    warn!(%key, "duplicate key among siblings; only the first is matched");
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
