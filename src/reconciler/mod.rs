//! Reconciler - the render phase and the loop that drives it.
//!
//! # Render Phase
//!
//! A render walks the work-in-progress tree depth first. `begin_work` runs
//! a fiber's body and diffs its children; `complete_work` creates host
//! instances and bubbles flags and lanes upward. Nothing visible changes
//! until the finished tree is handed to the commit phase.
//!
//! ```text
//!   HostRoot ──begin──▶ App ──begin──▶ div ──begin──▶ "hi"
//!                                       ◀──complete── (leaf)
//!                       ◀──complete──  div
//!   ◀──complete──       App
//!   commit(HostRoot)
//! ```
//!
//! # State
//!
//! All render-scoped values live in [`RenderContext`], owned by the engine
//! and passed down explicitly. There are no process globals.

mod begin;
mod child;
mod complete;
mod unwind;
mod work_loop;

pub(crate) use work_loop::{passive_flush_task, EngineCell, Request};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::context::ContextStack;
use crate::error::FiberError;
use crate::fiber::{FiberArena, FiberId, FiberNode, FiberRef, FiberRoot};
use crate::hooks::UpdateSink;
use crate::host::HostConfig;
use crate::lanes::{Lane, Lanes, NO_LANE};
use crate::scheduler::Scheduler;
use crate::thenable::SuspendHandle;

/// Result of beginning one fiber.
#[derive(Debug)]
pub(crate) enum BeginOutcome {
    /// Descend into the given child next, or complete this fiber if `None`.
    Continue(Option<FiberRef>),
    /// Nothing below has work at the render lane.
    Skip,
    /// The body is waiting on an awaitable.
    Suspend(SuspendHandle),
}

/// How a render pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RootExitStatus {
    /// Yielded with work left.
    InProgress,
    /// The whole tree completed; ready to commit.
    Completed,
    /// Suspended outside any boundary.
    DidNotComplete,
}

/// Render-scoped state of the pass in progress.
pub(crate) struct RenderContext {
    /// Lane being rendered; [`NO_LANE`] when idle.
    pub lane: Lane,
    pub wip_root: Option<FiberRef>,
    pub work_in_progress: Option<FiberRef>,
    pub exit: RootExitStatus,
    pub contexts: ContextStack,
    /// Boundary that catches a suspension at the current depth.
    pub suspense_stack: Vec<Option<FiberRef>>,
    /// Slots allocated by this pass. Unreachable ones are freed at commit.
    pub fresh: Vec<FiberId>,
    pub did_receive_update: bool,
    /// Lanes scheduled while this pass was running.
    pub interleaved_lanes: Lanes,
}

impl RenderContext {
    pub fn idle() -> Self {
        Self {
            lane: NO_LANE,
            wip_root: None,
            work_in_progress: None,
            exit: RootExitStatus::InProgress,
            contexts: ContextStack::default(),
            suspense_stack: Vec::new(),
            fresh: Vec::new(),
            did_receive_update: false,
            interleaved_lanes: Lanes::empty(),
        }
    }

    pub fn is_rendering(&self) -> bool {
        self.wip_root.is_some()
    }

    /// Innermost boundary that can catch a suspension here.
    pub fn nearest_boundary(&self) -> Option<FiberRef> {
        self.suspense_stack.last().copied().flatten()
    }
}

/// Everything the reconciler owns for one root.
pub(crate) struct EngineState<H: HostConfig> {
    pub host: H,
    pub arena: FiberArena<H>,
    pub root: FiberRoot<H>,
    pub render: RenderContext,
    pub scheduler: Scheduler,
    pub errors: Vec<FiberError>,
    /// A sync flush is queued as a microtask.
    pub sync_scheduled: bool,
    pub(crate) sink: Weak<dyn UpdateSink>,
    pub(crate) engine: Weak<EngineCell<H>>,
    pub(crate) inbox: Rc<RefCell<VecDeque<Request>>>,
}

impl<H: HostConfig> EngineState<H> {
    pub fn new(
        host: H,
        container: H::Instance,
        scheduler: Scheduler,
        engine: Weak<EngineCell<H>>,
        inbox: Rc<RefCell<VecDeque<Request>>>,
    ) -> Self {
        let mut arena = FiberArena::new();
        let root = FiberRoot::new(&mut arena, container);
        let sink: Weak<dyn UpdateSink> = engine.clone();
        Self {
            host,
            arena,
            root,
            render: RenderContext::idle(),
            scheduler,
            errors: Vec::new(),
            sync_scheduled: false,
            sink,
            engine,
            inbox,
        }
    }

    /// Allocate a fiber owned by the pass in progress.
    pub(crate) fn alloc_fiber(&mut self, node: FiberNode<H>) -> FiberRef {
        let fiber = self.arena.alloc(node);
        self.render.fresh.push(fiber.id);
        fiber
    }

    /// Drop the pass in progress and every slot it allocated.
    pub(crate) fn discard_render(&mut self) {
        let render = std::mem::replace(&mut self.render, RenderContext::idle());
        if !render.fresh.is_empty() {
            trace!(count = render.fresh.len(), "freeing discarded fibers");
        }
        for id in render.fresh {
            self.arena.free(id);
        }
    }
}
