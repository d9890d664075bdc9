//! Scheduler tasks.
//!
//! A task wraps a resumable callback. Calling it returns either `None`
//! (finished) or a continuation holding the remaining work.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::priority::Priority;

/// Resumable unit of work.
///
/// The `bool` argument reports whether the task's deadline has passed.
pub struct TaskCallback(Box<dyn FnOnce(bool) -> Option<TaskCallback>>);

impl TaskCallback {
    pub fn new(f: impl FnOnce(bool) -> Option<TaskCallback> + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Run the callback, returning its continuation if work remains.
    pub fn call(self, did_timeout: bool) -> Option<TaskCallback> {
        (self.0)(did_timeout)
    }
}

impl fmt::Debug for TaskCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskCallback")
    }
}

/// A pending task owned by the scheduler's heaps.
pub struct Task {
    pub(crate) id: u64,
    pub(crate) priority: Priority,
    pub(crate) start_time: f64,
    pub(crate) deadline: f64,
    pub(crate) callback: RefCell<Option<TaskCallback>>,
    pub(crate) cancelled: Cell<bool>,
    pub(crate) running: Cell<bool>,
}

/// Shared handle to a task. Compare handles with [`Rc::ptr_eq`] or by id.
pub type TaskHandle = Rc<Task>;

impl Task {
    pub(crate) fn new(
        id: u64,
        priority: Priority,
        current_time: f64,
        delay: Option<f64>,
        callback: TaskCallback,
    ) -> Self {
        let start_time = match delay {
            Some(delay) if delay > 0.0 => current_time + delay,
            _ => current_time,
        };
        Self {
            id,
            priority,
            start_time,
            deadline: start_time + priority.timeout(),
            callback: RefCell::new(Some(callback)),
            cancelled: Cell::new(false),
            running: Cell::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn deadline(&self) -> f64 {
        self.deadline
    }

    /// Whether the task still has work to run. A task counts as pending
    /// while its callback executes.
    pub fn is_pending(&self) -> bool {
        !self.cancelled.get() && (self.running.get() || self.callback.borrow().is_some())
    }

    /// Drop the callback. The task stays in its heap until popped.
    pub(crate) fn cancel(&self) {
        self.cancelled.set(true);
        self.callback.borrow_mut().take();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("start_time", &self.start_time)
            .field("deadline", &self.deadline)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_from_priority_and_delay() {
        let task = Task::new(1, Priority::UserBlocking, 100.0, Some(20.0), TaskCallback::new(|_| None));
        assert_eq!(task.start_time(), 120.0);
        assert_eq!(task.deadline(), 370.0);

        let task = Task::new(2, Priority::Immediate, 100.0, Some(-5.0), TaskCallback::new(|_| None));
        assert_eq!(task.start_time(), 100.0);
        assert_eq!(task.deadline(), 99.0);
    }

    #[test]
    fn test_cancel_nulls_callback() {
        let task = Task::new(1, Priority::Normal, 0.0, None, TaskCallback::new(|_| None));
        assert!(task.is_pending());
        task.cancel();
        assert!(!task.is_pending());
        assert!(task.callback.borrow().is_none());
    }
}
