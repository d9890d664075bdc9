//! State setters handed out by `use_state`.

use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::fiber::FiberId;
use crate::lanes::{request_update_lane, Lane, NO_LANE};
use crate::scheduler::{Priority, Scheduler};
use crate::update_queue::{Action, Update, UpdateQueue};

/// Where dispatched updates are delivered.
pub(crate) trait UpdateSink {
    /// Mark `fiber` and its ancestors with `lane` and schedule the root.
    fn schedule_update(&self, fiber: FiberId, lane: Lane);

    /// Whether no generation of `fiber` has pending lanes.
    fn is_fiber_idle(&self, fiber: FiberId) -> bool;
}

/// Setter for one state hook. Clones dispatch to the same queue.
pub struct Dispatch<S> {
    fiber: FiberId,
    queue: UpdateQueue<S>,
    sink: Weak<dyn UpdateSink>,
    scheduler: Scheduler,
}

impl<S> Clone for Dispatch<S> {
    fn clone(&self) -> Self {
        Self {
            fiber: self.fiber,
            queue: self.queue.clone(),
            sink: self.sink.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<S> PartialEq for Dispatch<S> {
    fn eq(&self, other: &Self) -> bool {
        self.queue.ptr_eq(&other.queue)
    }
}

impl<S> fmt::Debug for Dispatch<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").field("fiber", &self.fiber).finish()
    }
}

impl<S: Clone + PartialEq + 'static> Dispatch<S> {
    pub(crate) fn new(
        fiber: FiberId,
        queue: UpdateQueue<S>,
        sink: Weak<dyn UpdateSink>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            fiber,
            queue,
            sink,
            scheduler,
        }
    }

    /// Replace the state.
    pub fn set(&self, value: S) {
        self.dispatch(Action::Replace(value));
    }

    /// Compute the next state from the previous one.
    pub fn update(&self, f: impl Fn(&S) -> S + 'static) {
        self.dispatch(Action::Reduce(Rc::new(f)));
    }

    fn dispatch(&self, action: Action<S>) {
        let Some(sink) = self.sink.upgrade() else {
            trace!(fiber = ?self.fiber, "dispatch after unmount ignored");
            return;
        };
        let lane = request_update_lane(&self.scheduler);

        // nothing queued: compute now and skip the render if nothing changes
        if sink.is_fiber_idle(self.fiber) {
            if let Some(last) = self.queue.last_rendered_state() {
                let eager = action.apply(&last);
                if eager == last {
                    trace!(fiber = ?self.fiber, "eager bailout");
                    self.queue.enqueue(Update::new(Action::Replace(eager), NO_LANE));
                    return;
                }
            }
        }

        self.queue.enqueue(Update::new(action, lane));
        sink.schedule_update(self.fiber, lane);
    }
}

/// Starts transitions for one `use_transition` hook.
#[derive(Clone)]
pub struct StartTransition {
    set_pending: Dispatch<bool>,
    scheduler: Scheduler,
}

impl PartialEq for StartTransition {
    fn eq(&self, other: &Self) -> bool {
        self.set_pending == other.set_pending
    }
}

impl fmt::Debug for StartTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StartTransition")
    }
}

impl StartTransition {
    pub(crate) fn new(set_pending: Dispatch<bool>, scheduler: Scheduler) -> Self {
        Self {
            set_pending,
            scheduler,
        }
    }

    /// Run `f` so that every update it dispatches lands in the transition lane.
    ///
    /// The pending flag flips to `true` urgently, then back to `false`
    /// together with the transition's own updates.
    pub fn start(&self, f: impl FnOnce()) {
        self.scheduler
            .run_with_priority(Priority::Immediate, || self.set_pending.set(true));
        self.scheduler.start_transition(|| {
            f();
            self.set_pending.set(false);
        });
    }
}
