//! Host adapter - the boundary between the reconciler and a concrete tree.
//!
//! The engine never touches host nodes directly. Instances are created in
//! the complete phase (detached, with their initial children appended) and
//! every later change happens in the commit phase through this trait.

use std::fmt;

use crate::element::Props;
use crate::error::Result;
use crate::scheduler::{Microtask, Scheduler};

/// Operations a renderer target provides.
///
/// `Instance` is a cheap handle (an id, an `Rc`). The root container is an
/// instance too, so child operations take any parent uniformly.
pub trait HostConfig: 'static {
    type Instance: Clone + PartialEq + fmt::Debug + 'static;

    fn create_instance(&mut self, kind: &str, props: &Props) -> Result<Self::Instance>;

    fn create_text_instance(&mut self, text: &str) -> Result<Self::Instance>;

    /// Append to a parent that is not yet attached (complete phase).
    fn append_initial_child(&mut self, parent: &Self::Instance, child: &Self::Instance) -> Result<()>;

    fn append_child(&mut self, parent: &Self::Instance, child: &Self::Instance) -> Result<()>;

    fn insert_before(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
        before: &Self::Instance,
    ) -> Result<()>;

    fn remove_child(&mut self, parent: &Self::Instance, child: &Self::Instance) -> Result<()>;

    fn commit_update(
        &mut self,
        instance: &Self::Instance,
        kind: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Result<()>;

    fn commit_text_update(&mut self, instance: &Self::Instance, old_text: &str, new_text: &str) -> Result<()>;

    fn hide_instance(&mut self, instance: &Self::Instance) -> Result<()>;

    fn unhide_instance(&mut self, instance: &Self::Instance, props: &Props) -> Result<()>;

    fn hide_text_instance(&mut self, instance: &Self::Instance) -> Result<()>;

    fn unhide_text_instance(&mut self, instance: &Self::Instance, text: &str) -> Result<()>;

    /// Queue `task` to run before the next macrotask. Sync-lane work flushes here.
    fn schedule_microtask(&self, scheduler: &Scheduler, task: Microtask) {
        scheduler.queue_microtask(task);
    }
}
