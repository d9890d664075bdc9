//! Cooperative Scheduler - time-sliced task execution on one thread.
//!
//! # Architecture
//!
//! ```text
//!   add_task ──► start_time > now ? ──yes──► sleep queue (by start_time) ──┐
//!                      │ no                                               │ wake
//!                      ▼                                                  ▼
//!               ready queue (by deadline) ◄────────────────────────────────┘
//!                      │
//!                      ▼
//!   work(): slice_start = now, wake, pop + run until is_slice_end()
//! ```
//!
//! The scheduler owns its own event loop. Two channels exist:
//! - **Microtasks** - drained before every turn; used for sync-lane flushes
//! - **Macrotasks** - one [`Scheduler::work`] turn per request, plus an armed
//!   timer for the earliest sleeping task
//!
//! Drive the loop with [`Scheduler::flush`] (run until idle) or
//! [`Scheduler::run_turn`] (exactly one turn).
//!
//! Cancellation is lazy: [`Scheduler::cancel_task`] drops the callback and the
//! task is discarded when it reaches the top of its heap.

mod clock;
mod heap;
mod priority;
mod task;

pub use clock::{Clock, ManualClock, SystemClock};
pub use heap::{Heap, HeapKey};
pub use priority::{Priority, MAX_SIGNED_31_BIT_INT};
pub use task::{Task, TaskCallback, TaskHandle};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::config::SchedulerConfig;

/// Work queued on the microtask channel.
pub type Microtask = Box<dyn FnOnce()>;

fn by_deadline(task: &TaskHandle) -> HeapKey {
    (task.deadline, task.id)
}

fn by_start_time(task: &TaskHandle) -> HeapKey {
    (task.start_time, task.id)
}

struct SchedulerInner {
    config: SchedulerConfig,
    clock: Rc<dyn Clock>,
    ready: RefCell<Heap<TaskHandle>>,
    sleep: RefCell<Heap<TaskHandle>>,
    microtasks: RefCell<VecDeque<Microtask>>,
    slice_start: Cell<f64>,
    current_priority: Cell<Priority>,
    /// A macrotask turn has been requested ("next slice will work").
    turn_requested: Cell<bool>,
    /// Armed timer for the earliest sleeping task.
    timer: Cell<Option<f64>>,
    next_id: Cell<u64>,
    in_transition: Cell<bool>,
}

/// Shared scheduler handle. Clones refer to the same queues.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    /// Scheduler on the system clock with the default slice.
    pub fn new() -> Self {
        Self::with_config(SystemClock::new(), SchedulerConfig::default())
    }

    /// Scheduler on a custom clock with the default slice.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self::with_config(clock, SchedulerConfig::default())
    }

    pub fn with_config(clock: impl Clock + 'static, config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                config,
                clock: Rc::new(clock),
                ready: RefCell::new(Heap::new(by_deadline)),
                sleep: RefCell::new(Heap::new(by_start_time)),
                microtasks: RefCell::new(VecDeque::new()),
                slice_start: Cell::new(0.0),
                current_priority: Cell::new(Priority::Normal),
                turn_requested: Cell::new(false),
                timer: Cell::new(None),
                next_id: Cell::new(1),
                in_transition: Cell::new(false),
            }),
        }
    }

    /// Current time on the scheduler's clock.
    pub fn now(&self) -> f64 {
        self.inner.clock.now()
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    // =========================================================================
    // Task Submission
    // =========================================================================

    /// Submit a task that may start immediately.
    pub fn add_task(&self, priority: Priority, callback: TaskCallback) -> TaskHandle {
        self.add_task_with_delay(priority, callback, None)
    }

    /// Submit a task, optionally delayed by `delay` milliseconds.
    pub fn add_task_with_delay(
        &self,
        priority: Priority,
        callback: TaskCallback,
        delay: Option<f64>,
    ) -> TaskHandle {
        let inner = &self.inner;
        let now = self.now();
        let id = inner.next_id.get();
        inner.next_id.set(id + 1);

        let task = Rc::new(Task::new(id, priority, now, delay, callback));
        trace!(id, ?priority, start = task.start_time, deadline = task.deadline, "add task");

        if task.start_time > now {
            let mut sleep = inner.sleep.borrow_mut();
            sleep.push(task.clone());
            let is_earliest = sleep.peek().is_some_and(|t| Rc::ptr_eq(t, &task));
            if inner.ready.borrow().is_empty() && is_earliest {
                inner.timer.set(Some(task.start_time));
            }
        } else {
            inner.ready.borrow_mut().push(task.clone());
            self.request_turn();
        }
        task
    }

    /// Cancel a task. Its callback is dropped; the heap entry is skipped later.
    pub fn cancel_task(&self, task: &TaskHandle) {
        trace!(id = task.id, "cancel task");
        task.cancel();
    }

    fn request_turn(&self) {
        if !self.inner.turn_requested.get() {
            self.inner.turn_requested.set(true);
        }
    }

    // =========================================================================
    // Ambient Priority
    // =========================================================================

    /// Priority of the work currently executing.
    pub fn current_priority(&self) -> Priority {
        self.inner.current_priority.get()
    }

    /// Run `f` with `priority` as the ambient priority, restoring it afterwards.
    pub fn run_with_priority<R>(&self, priority: Priority, f: impl FnOnce() -> R) -> R {
        let prev = self.inner.current_priority.replace(priority);
        let result = f();
        self.inner.current_priority.set(prev);
        result
    }

    /// Run `f` inside a transition batch: updates it requests get the transition lane.
    pub fn start_transition<R>(&self, f: impl FnOnce() -> R) -> R {
        let prev = self.inner.in_transition.replace(true);
        let result = f();
        self.inner.in_transition.set(prev);
        result
    }

    /// Whether a transition batch is active.
    pub fn is_in_transition(&self) -> bool {
        self.inner.in_transition.get()
    }

    // =========================================================================
    // Time Slicing
    // =========================================================================

    /// Whether the current slice has used up its budget.
    pub fn is_slice_end(&self) -> bool {
        self.now() - self.inner.slice_start.get() >= self.inner.config.slice_ms
    }

    /// Move sleeping tasks whose start time has arrived into the ready queue.
    fn wake(&self, now: f64) {
        let mut sleep = self.inner.sleep.borrow_mut();
        loop {
            let Some(task) = sleep.peek() else { return };
            if !task.is_pending() {
                sleep.pop();
            } else if task.start_time <= now {
                if let Some(task) = sleep.pop() {
                    self.inner.ready.borrow_mut().push(task);
                }
            } else {
                return;
            }
        }
    }

    fn pop_if_top(&self, task: &TaskHandle) {
        let mut ready = self.inner.ready.borrow_mut();
        if ready.peek().is_some_and(|top| Rc::ptr_eq(top, task)) {
            ready.pop();
        }
    }

    /// One macrotask turn: wake sleepers, then run ready tasks until the slice ends.
    pub fn work(&self) {
        let inner = &self.inner;
        let now = self.now();
        inner.slice_start.set(now);
        inner.turn_requested.set(false);
        inner.timer.set(None);

        self.wake(now);
        self.run_ready();

        if !inner.ready.borrow().is_empty() {
            self.request_turn();
        } else if let Some(start) = inner.sleep.borrow().peek().map(|t| t.start_time) {
            inner.timer.set(Some(start));
        }
    }

    fn run_ready(&self) {
        loop {
            let Some(task) = self.inner.ready.borrow().peek().cloned() else {
                return;
            };
            if !task.is_pending() {
                self.pop_if_top(&task);
                continue;
            }
            if task.deadline > self.now() && self.is_slice_end() {
                return;
            }

            let mut callback = task.callback.borrow_mut().take();
            while let Some(cb) = callback.take() {
                let did_timeout = task.deadline <= self.now();
                trace!(id = task.id, did_timeout, "run task");
                task.running.set(true);
                let next = self.run_with_priority(task.priority, || cb.call(did_timeout));
                task.running.set(false);
                if task.cancelled.get() {
                    break;
                }
                callback = next;
                if callback.is_some() && self.is_slice_end() {
                    break;
                }
            }

            match callback {
                Some(cb) => {
                    *task.callback.borrow_mut() = Some(cb);
                    self.wake(self.now());
                    return;
                }
                None => {
                    self.pop_if_top(&task);
                    self.wake(self.now());
                }
            }
        }
    }

    // =========================================================================
    // Event Loop
    // =========================================================================

    /// Queue work on the microtask channel.
    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.microtasks.borrow_mut().push_back(Box::new(task));
    }

    /// Drain the microtask queue, including microtasks queued while draining.
    pub fn run_microtasks(&self) -> usize {
        let mut count = 0;
        loop {
            let next = self.inner.microtasks.borrow_mut().pop_front();
            let Some(task) = next else { return count };
            task();
            count += 1;
        }
    }

    /// Whether any microtask, ready task or sleeping task remains.
    pub fn has_pending_work(&self) -> bool {
        !self.inner.microtasks.borrow().is_empty()
            || self.inner.turn_requested.get()
            || self.inner.timer.get().is_some()
    }

    /// Run one event-loop turn. Returns whether a macrotask turn ran.
    pub fn run_turn(&self) -> bool {
        self.run_microtasks();
        let due = self.inner.timer.get().is_some_and(|at| at <= self.now());
        if self.inner.turn_requested.get() || due {
            self.work();
            self.run_microtasks();
            return true;
        }
        false
    }

    /// Run the event loop until no work remains, waiting on the clock for sleepers.
    pub fn flush(&self) {
        loop {
            self.run_microtasks();
            if self.inner.turn_requested.get() {
                self.work();
                continue;
            }
            if let Some(at) = self.inner.timer.get() {
                self.inner.clock.wait_until(at);
                self.work();
                continue;
            }
            return;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("ready", &self.inner.ready.borrow().len())
            .field("sleeping", &self.inner.sleep.borrow().len())
            .field("microtasks", &self.inner.microtasks.borrow().len())
            .field("priority", &self.current_priority())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> (Scheduler, ManualClock) {
        let clock = ManualClock::new();
        (Scheduler::with_clock(clock.clone()), clock)
    }

    fn logging(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> TaskCallback {
        let log = log.clone();
        TaskCallback::new(move |_| {
            log.borrow_mut().push(name);
            None
        })
    }

    #[test]
    fn test_ready_tasks_run_by_deadline() {
        let (scheduler, _clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.add_task(Priority::Low, logging(&log, "low"));
        scheduler.add_task(Priority::Normal, logging(&log, "normal"));
        scheduler.add_task(Priority::Immediate, logging(&log, "immediate"));
        scheduler.add_task(Priority::UserBlocking, logging(&log, "blocking"));

        scheduler.flush();
        assert_eq!(*log.borrow(), vec!["immediate", "blocking", "normal", "low"]);
    }

    #[test]
    fn test_delayed_task_waits_for_start_time() {
        let (scheduler, clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.add_task_with_delay(Priority::Immediate, logging(&log, "late"), Some(100.0));
        scheduler.add_task(Priority::Idle, logging(&log, "idle"));

        assert!(scheduler.run_turn());
        assert_eq!(*log.borrow(), vec!["idle"]);
        assert!(!scheduler.run_turn(), "sleeper is not due yet");

        clock.advance(100.0);
        assert!(scheduler.run_turn());
        assert_eq!(*log.borrow(), vec!["idle", "late"]);
    }

    #[test]
    fn test_flush_waits_on_clock_for_sleepers() {
        let (scheduler, clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));
        scheduler.add_task_with_delay(Priority::Normal, logging(&log, "a"), Some(40.0));
        scheduler.flush();
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(clock.now(), 40.0);
    }

    #[test]
    fn test_cancel_is_lazy() {
        let (scheduler, _clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));

        let task = scheduler.add_task(Priority::Normal, logging(&log, "cancelled"));
        scheduler.add_task(Priority::Low, logging(&log, "kept"));
        scheduler.cancel_task(&task);
        assert!(!task.is_pending());

        scheduler.flush();
        assert_eq!(*log.borrow(), vec!["kept"]);
    }

    #[test]
    fn test_continuation_yields_when_slice_ends() {
        let (scheduler, clock) = manual();
        let steps = Rc::new(Cell::new(0));

        fn step(steps: Rc<Cell<u32>>, clock: ManualClock) -> TaskCallback {
            TaskCallback::new(move |_| {
                steps.set(steps.get() + 1);
                clock.advance(3.0);
                if steps.get() < 4 {
                    Some(step(steps, clock))
                } else {
                    None
                }
            })
        }

        scheduler.add_task(Priority::Normal, step(steps.clone(), clock.clone()));

        // 3ms per step, 5ms slice: two steps fit in the first turn
        assert!(scheduler.run_turn());
        assert_eq!(steps.get(), 2);
        assert!(scheduler.run_turn());
        assert_eq!(steps.get(), 4);
        assert!(!scheduler.has_pending_work());
    }

    #[test]
    fn test_run_with_priority_restores_ambient() {
        let (scheduler, _clock) = manual();
        assert_eq!(scheduler.current_priority(), Priority::Normal);
        let seen = scheduler.run_with_priority(Priority::Immediate, || scheduler.current_priority());
        assert_eq!(seen, Priority::Immediate);
        assert_eq!(scheduler.current_priority(), Priority::Normal);
    }

    #[test]
    fn test_task_sees_its_own_priority() {
        let (scheduler, _clock) = manual();
        let seen = Rc::new(Cell::new(Priority::NoPriority));
        let seen_clone = seen.clone();
        let handle = scheduler.clone();
        scheduler.add_task(
            Priority::UserBlocking,
            TaskCallback::new(move |_| {
                seen_clone.set(handle.current_priority());
                None
            }),
        );
        scheduler.flush();
        assert_eq!(seen.get(), Priority::UserBlocking);
    }

    #[test]
    fn test_microtasks_run_before_turns() {
        let (scheduler, _clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));
        scheduler.add_task(Priority::Immediate, logging(&log, "task"));
        let log_clone = log.clone();
        scheduler.queue_microtask(move || log_clone.borrow_mut().push("micro"));
        scheduler.flush();
        assert_eq!(*log.borrow(), vec!["micro", "task"]);
    }

    #[test]
    fn test_transition_scope_nests() {
        let (scheduler, _clock) = manual();
        assert!(!scheduler.is_in_transition());
        scheduler.start_transition(|| {
            assert!(scheduler.is_in_transition());
            scheduler.start_transition(|| assert!(scheduler.is_in_transition()));
            assert!(scheduler.is_in_transition());
        });
        assert!(!scheduler.is_in_transition());
    }
}
