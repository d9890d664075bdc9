//! Public entry point: create a root over a host container and render into it.

use std::rc::Rc;

use tracing::debug;

use crate::config::RootConfig;
use crate::element::Node;
use crate::error::{FiberError, Result};
use crate::fiber::{FiberId, FiberUpdateQueue, Flags};
use crate::hooks::UpdateSink;
use crate::host::HostConfig;
use crate::lanes::{Lane, Lanes};
use crate::reconciler::EngineCell;
use crate::scheduler::Scheduler;
use crate::update_queue::{Action, Update, UpdateQueue};

/// A mounted tree. Cheap to clone; clones drive the same root.
pub struct Root<H: HostConfig> {
    engine: Rc<EngineCell<H>>,
    queue: UpdateQueue<Node>,
    fiber: FiberId,
    scheduler: Scheduler,
    config: RootConfig,
}

impl<H: HostConfig> Clone for Root<H> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            queue: self.queue.clone(),
            fiber: self.fiber,
            scheduler: self.scheduler.clone(),
            config: self.config,
        }
    }
}

/// Create a root that renders into `container` through `host`.
pub fn create_root<H: HostConfig>(host: H, container: H::Instance, scheduler: &Scheduler) -> Root<H> {
    create_root_with_config(host, container, scheduler, RootConfig::default())
}

pub fn create_root_with_config<H: HostConfig>(
    host: H,
    container: H::Instance,
    scheduler: &Scheduler,
    config: RootConfig,
) -> Root<H> {
    let engine = EngineCell::new(host, container, scheduler.clone());
    let (queue, fiber) = engine
        .inspect(|state| {
            let current = state.root.current;
            let queue = match &state.arena[current].update_queue {
                FiberUpdateQueue::Root(queue) => queue.clone(),
                _ => UpdateQueue::new(),
            };
            (queue, current.id)
        })
        .unwrap_or_else(|| (UpdateQueue::new(), FiberId::default()));
    debug!(lane = ?config.render_lane, "root created");
    Root {
        engine,
        queue,
        fiber,
        scheduler: scheduler.clone(),
        config,
    }
}

impl<H: HostConfig> Root<H> {
    /// Schedule `element` as the new tree. Inside a transition the render
    /// takes the transition lane; otherwise the configured root lane.
    pub fn render(&self, element: impl Into<Node>) {
        let lane = self.update_lane();
        self.queue.enqueue(Update::new(Action::Replace(element.into()), lane));
        self.engine.schedule_update(self.fiber, lane);
    }

    /// Schedule an empty tree, tearing everything down.
    pub fn unmount(&self) {
        self.render(Node::Empty);
    }

    fn update_lane(&self) -> Lane {
        if self.scheduler.is_in_transition() {
            Lanes::TRANSITION
        } else {
            self.config.render_lane
        }
    }

    /// Run the scheduler until idle. Returns the first render error since
    /// the last call, if any.
    pub fn flush(&self) -> Result<()> {
        self.scheduler.flush();
        match self.take_errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Errors recorded by failed passes, oldest first.
    pub fn take_errors(&self) -> Vec<FiberError> {
        self.engine
            .with_state(|state| std::mem::take(&mut state.errors))
            .unwrap_or_default()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of commits so far.
    pub fn commit_count(&self) -> usize {
        self.engine.inspect(|state| state.root.commit_count).unwrap_or(0)
    }

    /// Flags of the last committed tree, root included.
    pub fn last_commit_flags(&self) -> Flags {
        self.engine
            .inspect(|state| state.root.last_commit_flags)
            .unwrap_or_default()
    }

    /// Lanes with work not yet committed.
    pub fn pending_lanes(&self) -> Lanes {
        self.engine.inspect(|state| state.root.pending_lanes).unwrap_or_default()
    }

    /// Fiber slots currently allocated.
    pub fn fiber_count(&self) -> usize {
        self.engine.inspect(|state| state.arena.len()).unwrap_or(0)
    }
}
