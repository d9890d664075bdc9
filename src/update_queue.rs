//! Update Queue - lane-tagged state transitions and batched replay.
//!
//! Updates are kept in insertion order in a ring whose tail is the most
//! recent update and whose head (`tail.next`) is the oldest. The queue's
//! `pending` ring is shared by both generations of a fiber, so an update
//! enqueued while a render is in flight is never lost.
//!
//! # Replay
//!
//! [`process_update_queue`] walks the ring once from the head:
//! - an update whose lane is not in the render lanes is cloned into the new
//!   base queue and reported through `on_skip`
//! - every other update is folded into the running state
//!
//! The first skip freezes `base_state`, and every update after it is kept in
//! the base queue with [`NO_LANE`] so a later pass replays the tail in order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::lanes::{Lane, Lanes, NO_LANE};

// =============================================================================
// Update
// =============================================================================

/// A state transition: replace the state, or compute it from the previous one.
pub enum Action<S> {
    Replace(S),
    Reduce(Rc<dyn Fn(&S) -> S>),
}

impl<S: Clone> Action<S> {
    /// Apply the action to `state`.
    pub fn apply(&self, state: &S) -> S {
        match self {
            Action::Replace(next) => next.clone(),
            Action::Reduce(f) => f(state),
        }
    }
}

impl<S: Clone> Clone for Action<S> {
    fn clone(&self) -> Self {
        match self {
            Action::Replace(next) => Action::Replace(next.clone()),
            Action::Reduce(f) => Action::Reduce(f.clone()),
        }
    }
}

impl<S> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Replace(_) => f.write_str("Replace"),
            Action::Reduce(_) => f.write_str("Reduce"),
        }
    }
}

/// One queued update.
#[derive(Debug)]
pub struct Update<S> {
    pub action: Action<S>,
    pub lane: Lane,
}

impl<S: Clone> Clone for Update<S> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            lane: self.lane,
        }
    }
}

impl<S> Update<S> {
    pub fn new(action: Action<S>, lane: Lane) -> Self {
        Self { action, lane }
    }
}

// =============================================================================
// Ring
// =============================================================================

/// Circular update list in insertion order.
#[derive(Debug)]
pub struct UpdateRing<S> {
    updates: VecDeque<Update<S>>,
}

impl<S> Default for UpdateRing<S> {
    fn default() -> Self {
        Self {
            updates: VecDeque::new(),
        }
    }
}

impl<S: Clone> Clone for UpdateRing<S> {
    fn clone(&self) -> Self {
        Self {
            updates: self.updates.clone(),
        }
    }
}

impl<S> UpdateRing<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Oldest update (`pending.next`).
    pub fn head(&self) -> Option<&Update<S>> {
        self.updates.front()
    }

    /// Most recent update (`pending`).
    pub fn tail(&self) -> Option<&Update<S>> {
        self.updates.back()
    }

    /// Append after the tail.
    pub fn push(&mut self, update: Update<S>) {
        self.updates.push_back(update);
    }

    /// Splice `other` after this ring's tail.
    pub fn append(&mut self, mut other: UpdateRing<S>) {
        self.updates.append(&mut other.updates);
    }

    /// Walk once around the ring starting at the head.
    pub fn iter(&self) -> impl Iterator<Item = &Update<S>> {
        self.updates.iter()
    }

    /// Union of the lanes of all updates.
    pub fn lanes(&self) -> Lanes {
        Lanes::merge(self.updates.iter().map(|u| u.lane))
    }
}

// =============================================================================
// Shared Queue
// =============================================================================

struct SharedQueue<S> {
    pending: UpdateRing<S>,
    last_rendered_state: Option<S>,
}

/// Queue of pending updates shared by both generations of a stateful cell.
pub struct UpdateQueue<S> {
    shared: Rc<RefCell<SharedQueue<S>>>,
}

impl<S> Clone for UpdateQueue<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S> fmt::Debug for UpdateQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("pending", &self.shared.borrow().pending.len())
            .finish()
    }
}

impl<S> Default for UpdateQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> UpdateQueue<S> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            shared: Rc::new(RefCell::new(SharedQueue {
                pending: UpdateRing::new(),
                last_rendered_state: None,
            })),
        }
    }

    /// Append `update` to the pending ring.
    pub fn enqueue(&self, update: Update<S>) {
        self.shared.borrow_mut().pending.push(update);
    }

    /// Detach the pending ring, leaving the queue empty.
    pub fn take_pending(&self) -> UpdateRing<S> {
        std::mem::take(&mut self.shared.borrow_mut().pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.shared.borrow().pending.is_empty()
    }

    /// Whether two handles refer to the same queue.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<S: Clone> UpdateQueue<S> {
    /// State produced by the last render that processed this queue.
    pub fn last_rendered_state(&self) -> Option<S> {
        self.shared.borrow().last_rendered_state.clone()
    }

    pub fn set_last_rendered_state(&self, state: S) {
        self.shared.borrow_mut().last_rendered_state = Some(state);
    }
}

/// Create an empty update queue.
pub fn create_update_queue<S>() -> UpdateQueue<S> {
    UpdateQueue::new()
}

/// Append `update` to `queue`. Marking the fiber's lanes is the caller's job.
pub fn enqueue_update<S>(queue: &UpdateQueue<S>, update: Update<S>) {
    queue.enqueue(update);
}

/// Prepend `base` to `pending`: the base queue holds older updates.
pub fn merge_rings<S>(mut base: UpdateRing<S>, pending: UpdateRing<S>) -> UpdateRing<S> {
    base.append(pending);
    base
}

// =============================================================================
// Replay
// =============================================================================

/// Outcome of replaying a queue at a render lane.
#[derive(Debug, Clone)]
pub struct ProcessedUpdates<S> {
    /// State after every included update.
    pub memoized_state: S,
    /// State to start the next replay from.
    pub base_state: S,
    /// Skipped updates plus everything after the first skip.
    pub base_queue: UpdateRing<S>,
}

/// Replay `queue` on top of `base_state`, applying only updates whose lane is
/// in `render_lanes`.
pub fn process_update_queue<S: Clone>(
    base_state: S,
    queue: &UpdateRing<S>,
    render_lanes: Lanes,
    mut on_skip: impl FnMut(&Update<S>),
) -> ProcessedUpdates<S> {
    let mut new_state = base_state.clone();
    let mut new_base_state: Option<S> = None;
    let mut new_base_queue = UpdateRing::new();

    for update in queue.iter() {
        if !render_lanes.is_superset_of(update.lane) {
            if new_base_queue.is_empty() {
                new_base_state = Some(new_state.clone());
            }
            new_base_queue.push(update.clone());
            on_skip(update);
        } else {
            if !new_base_queue.is_empty() {
                new_base_queue.push(Update::new(update.action.clone(), NO_LANE));
            }
            new_state = update.action.apply(&new_state);
        }
    }

    ProcessedUpdates {
        base_state: new_base_state.unwrap_or_else(|| new_state.clone()),
        memoized_state: new_state,
        base_queue: new_base_queue,
    }
}

// =============================================================================
// Tests
// =============================================================================
