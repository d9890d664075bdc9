//! Work loop - scheduling roots, running passes, routing updates.
//!
//! # Update routing
//!
//! Setters and settle listeners can fire while the engine is mid-pass (an
//! effect calling `set`, a thenable resolved inside a component). They never
//! touch engine state directly: each becomes a [`Request`] in the inbox, and
//! whoever holds the engine drains the inbox before letting go.
//!
//! # Entry points
//!
//! ```text
//!   microtask ──▶ flush_sync_work            (SYNC lane)
//!   task      ──▶ perform_concurrent_work    (other lanes, time-sliced)
//!   task      ──▶ flush_passive_effects      (after a commit with effects)
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::{EngineState, RenderContext, RootExitStatus};
use crate::error::{FiberError, Result};
use crate::fiber::{FiberId, FiberRef, WorkTag};
use crate::hooks::UpdateSink;
use crate::host::HostConfig;
use crate::lanes::{lanes_to_scheduler_priority, Lane, Lanes, NO_LANE};
use crate::scheduler::{Scheduler, TaskCallback, TaskHandle};

/// Sync passes allowed back to back before the flush gives up.
const NESTED_UPDATE_LIMIT: usize = 50;

/// Work handed to the engine from outside a pass.
#[derive(Debug)]
pub(crate) enum Request {
    Update { fiber: FiberId, lane: Lane },
    Ping { wakeable: usize, target: Option<FiberId>, lane: Lane },
}

/// Shared owner of one root's engine state.
pub(crate) struct EngineCell<H: HostConfig> {
    state: RefCell<EngineState<H>>,
    inbox: Rc<RefCell<VecDeque<Request>>>,
}

impl<H: HostConfig> EngineCell<H> {
    pub fn new(host: H, container: H::Instance, scheduler: Scheduler) -> Rc<Self> {
        Rc::new_cyclic(|engine: &Weak<Self>| {
            let inbox: Rc<RefCell<VecDeque<Request>>> = Rc::default();
            let state = EngineState::new(host, container, scheduler, engine.clone(), inbox.clone());
            Self {
                state: RefCell::new(state),
                inbox,
            }
        })
    }

    /// Run `f` with exclusive access, then drain requests it produced.
    /// `None` when the engine is already borrowed further up the stack.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut EngineState<H>) -> R) -> Option<R> {
        let result = {
            let Ok(mut state) = self.state.try_borrow_mut() else {
                warn!("engine re-entered; request deferred");
                return None;
            };
            f(&mut state)
        };
        self.drain();
        Some(result)
    }

    /// Read-only access for inspection.
    pub fn inspect<R>(&self, f: impl FnOnce(&EngineState<H>) -> R) -> Option<R> {
        self.state.try_borrow().ok().map(|state| f(&state))
    }

    /// Queue a request and handle it now if the engine is free.
    pub fn push(&self, request: Request) {
        self.inbox.borrow_mut().push_back(request);
        self.drain();
    }

    fn drain(&self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.process_inbox();
        }
    }
}

impl<H: HostConfig> UpdateSink for EngineCell<H> {
    fn schedule_update(&self, fiber: FiberId, lane: Lane) {
        self.push(Request::Update { fiber, lane });
    }

    fn is_fiber_idle(&self, fiber: FiberId) -> bool {
        let queued = self
            .inbox
            .borrow()
            .iter()
            .any(|request| matches!(request, Request::Update { fiber: f, .. } if *f == fiber));
        if queued {
            return false;
        }
        match self.state.try_borrow() {
            Ok(state) => state.arena.is_idle(fiber),
            Err(_) => false,
        }
    }
}

// =============================================================================
// Task callbacks
// =============================================================================

fn concurrent_task<H: HostConfig>(engine: Weak<EngineCell<H>>) -> TaskCallback {
    TaskCallback::new(move |did_timeout| {
        let cell = engine.upgrade()?;
        let more = cell.with_state(|state| state.perform_concurrent_work(did_timeout))?;
        more.then(|| concurrent_task(engine))
    })
}

fn sync_flush<H: HostConfig>(engine: Weak<EngineCell<H>>) {
    if let Some(cell) = engine.upgrade() {
        cell.with_state(|state| state.flush_sync_work());
    }
}

pub(crate) fn passive_flush_task<H: HostConfig>(engine: Weak<EngineCell<H>>) -> TaskCallback {
    TaskCallback::new(move |_| {
        if let Some(cell) = engine.upgrade() {
            cell.with_state(|state| state.flush_passive_effects());
        }
        None
    })
}

fn same_task(a: &Option<TaskHandle>, b: &Option<TaskHandle>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

// =============================================================================
// Scheduling
// =============================================================================

impl<H: HostConfig> EngineState<H> {
    pub(crate) fn process_inbox(&mut self) {
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(request) = next else {
                return;
            };
            match request {
                Request::Update { fiber, lane } => self.schedule_update_on_fiber(fiber, lane),
                Request::Ping { wakeable, target, lane } => self.ping_root(wakeable, target, lane),
            }
        }
    }

    pub(crate) fn schedule_update_on_fiber(&mut self, fiber: FiberId, lane: Lane) {
        if lane == NO_LANE {
            return;
        }
        if !self.mark_update_lane_from_fiber_to_root(fiber, lane) {
            debug!(?fiber, "update on an unmounted fiber ignored");
            return;
        }
        self.root.mark_updated(lane);
        if self.render.is_rendering() {
            self.render.interleaved_lanes |= lane;
        }
        self.ensure_root_is_scheduled();
    }

    /// Add `lane` to the fiber and `child_lanes` to every ancestor, in both
    /// generations. False when the fiber is not connected to this root.
    fn mark_update_lane_from_fiber_to_root(&mut self, fiber: FiberId, lane: Lane) -> bool {
        if !self.arena.contains_id(fiber) {
            return false;
        }
        self.arena.merge_lanes(fiber, lane);
        let mut node = fiber;
        loop {
            let Some(parent) = self.arena.any_gen(node).and_then(|n| n.ret) else {
                return node == self.root.current.id;
            };
            self.arena.merge_child_lanes(parent.id, lane);
            node = parent.id;
        }
    }

    fn ping_root(&mut self, wakeable: usize, target: Option<FiberId>, lane: Lane) {
        self.root.ping_cache.remove(&wakeable);
        self.root.mark_pinged(lane);
        trace!(wakeable, ?lane, "pinged");
        match target {
            Some(boundary) if self.arena.contains_id(boundary) => self.schedule_update_on_fiber(boundary, lane),
            _ => {
                self.root.pending_lanes |= lane;
                self.ensure_root_is_scheduled();
            }
        }
    }

    /// Make sure exactly one callback is queued for the root's next lane.
    pub(crate) fn ensure_root_is_scheduled(&mut self) {
        let next = self.root.next_lane();
        if next == NO_LANE {
            if let Some(task) = self.root.callback_node.take() {
                self.scheduler.cancel_task(&task);
            }
            self.root.callback_priority = NO_LANE;
            return;
        }

        let existing = self.root.callback_priority;
        if existing == next {
            let alive = if next == Lanes::SYNC {
                self.sync_scheduled
            } else {
                self.root.callback_node.as_ref().is_some_and(|task| task.is_pending())
            };
            if alive {
                return;
            }
        }

        if let Some(task) = self.root.callback_node.take() {
            self.scheduler.cancel_task(&task);
        }

        if next == Lanes::SYNC {
            if !self.sync_scheduled {
                self.sync_scheduled = true;
                let engine = self.engine.clone();
                self.host
                    .schedule_microtask(&self.scheduler, Box::new(move || sync_flush(engine)));
            }
        } else {
            let priority = lanes_to_scheduler_priority(next);
            trace!(?next, ?priority, "root scheduled");
            let task = self.scheduler.add_task(priority, concurrent_task(self.engine.clone()));
            self.root.callback_node = Some(task);
        }
        self.root.callback_priority = next;
    }

    // -------------------------------------------------------------------------
    // Entry points
    // -------------------------------------------------------------------------

    /// Render every pending sync lane, committing as each pass completes.
    pub(crate) fn flush_sync_work(&mut self) {
        self.sync_scheduled = false;
        self.flush_passive_effects();

        let mut passes = 0;
        while self.root.next_lane() == Lanes::SYNC {
            passes += 1;
            if passes > NESTED_UPDATE_LIMIT {
                let err = FiberError::NestedUpdateLimit(NESTED_UPDATE_LIMIT);
                self.handle_render_error(Lanes::SYNC, err);
                break;
            }
            let exit = self.render_root_sync(Lanes::SYNC);
            self.finish_render(Lanes::SYNC, exit);
            self.process_inbox();
        }
        self.ensure_root_is_scheduled();
    }

    /// Task body for non-sync lanes. True when the same task should run again.
    pub(crate) fn perform_concurrent_work(&mut self, did_timeout: bool) -> bool {
        let original = self.root.callback_node.clone();
        if self.flush_passive_effects() && !same_task(&self.root.callback_node, &original) {
            // effects scheduled something that replaced this task
            return false;
        }

        let lane = self.root.next_lane();
        if lane == NO_LANE {
            return false;
        }
        let exit = if lane == Lanes::SYNC || did_timeout {
            self.render_root_sync(lane)
        } else {
            self.render_root_concurrent(lane)
        };
        self.finish_render(lane, exit);
        self.ensure_root_is_scheduled();
        same_task(&self.root.callback_node, &original)
    }

    // -------------------------------------------------------------------------
    // Passes
    // -------------------------------------------------------------------------

    fn prepare_fresh_stack(&mut self, lane: Lane) {
        if self.render.is_rendering() {
            debug!(from = ?self.render.lane, to = ?lane, "restarting render");
        }
        self.discard_render();
        let current = self.root.current;
        let props = self.arena[current].pending_props.clone();
        let wip = self.arena.create_work_in_progress(current, props);
        self.render = RenderContext::idle();
        self.render.lane = lane;
        self.render.wip_root = Some(wip);
        self.render.work_in_progress = Some(wip);
    }

    fn ensure_render_for(&mut self, lane: Lane) {
        if self.render.lane != lane || !self.render.is_rendering() {
            self.prepare_fresh_stack(lane);
        }
    }

    fn render_root_sync(&mut self, lane: Lane) -> Result<RootExitStatus> {
        self.ensure_render_for(lane);
        while let Some(unit) = self.render.work_in_progress {
            self.perform_unit_of_work(unit)?;
        }
        Ok(self.render.exit)
    }

    fn render_root_concurrent(&mut self, lane: Lane) -> Result<RootExitStatus> {
        self.ensure_render_for(lane);
        while let Some(unit) = self.render.work_in_progress {
            if self.scheduler.is_slice_end() {
                trace!(?lane, "yielding");
                return Ok(RootExitStatus::InProgress);
            }
            self.perform_unit_of_work(unit)?;
        }
        Ok(self.render.exit)
    }

    fn perform_unit_of_work(&mut self, unit: FiberRef) -> Result<()> {
        let outcome = self.begin_work(unit)?;
        match outcome {
            super::BeginOutcome::Suspend(handle) => {
                self.throw_exception(unit, handle);
                return Ok(());
            }
            super::BeginOutcome::Continue(Some(child)) => {
                self.memoize_props(unit);
                self.render.work_in_progress = Some(child);
            }
            super::BeginOutcome::Continue(None) | super::BeginOutcome::Skip => {
                self.memoize_props(unit);
                self.complete_unit_of_work(unit)?;
            }
        }
        Ok(())
    }

    fn memoize_props(&mut self, fiber: FiberRef) {
        let node = &mut self.arena[fiber];
        node.memoized_props = node.pending_props.clone();
    }

    fn complete_unit_of_work(&mut self, unit: FiberRef) -> Result<()> {
        let mut node = unit;
        loop {
            self.complete_work(node)?;
            if let Some(sibling) = self.arena[node].sibling {
                self.render.work_in_progress = Some(sibling);
                return Ok(());
            }
            match self.arena[node].ret {
                Some(parent) if self.arena[node].tag != WorkTag::HostRoot => node = parent,
                _ => {
                    self.render.work_in_progress = None;
                    self.render.exit = RootExitStatus::Completed;
                    return Ok(());
                }
            }
        }
    }

    fn finish_render(&mut self, lane: Lane, exit: Result<RootExitStatus>) {
        match exit {
            Ok(RootExitStatus::InProgress) => {}
            Ok(RootExitStatus::Completed) => {
                if let Err(err) = self.commit_root() {
                    self.handle_render_error(lane, err);
                }
            }
            Ok(RootExitStatus::DidNotComplete) => {
                self.discard_render();
                self.root.mark_suspended(lane);
            }
            Err(err) => self.handle_render_error(lane, err),
        }
    }

    /// Abandon the pass and drop its lane so the failure does not repeat.
    fn handle_render_error(&mut self, lane: Lane, err: FiberError) {
        warn!(%err, ?lane, "render failed");
        self.discard_render();
        self.root.pending_lanes.remove(lane);
        self.errors.push(err);
    }
}
