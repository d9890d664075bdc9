//! Passive effects - cleanups and setups queued by commits.
//!
//! All cleanups run before any setup: first for removed components, then
//! for effects whose deps changed. Within a list, hooks run in call order.

use tracing::trace;

use crate::fiber::HookFlags;
use crate::hooks::{commit_hook_effect_list_mount, commit_hook_effect_list_unmount};
use crate::host::HostConfig;
use crate::reconciler::EngineState;

impl<H: HostConfig> EngineState<H> {
    /// Run queued passive effects. False when nothing was queued.
    pub(crate) fn flush_passive_effects(&mut self) -> bool {
        self.root.passive_scheduled = false;
        if self.root.pending_passive.is_empty() {
            return false;
        }
        let pending = std::mem::take(&mut self.root.pending_passive);
        trace!(
            unmounted = pending.unmount.len(),
            updated = pending.update.len(),
            "flushing passive effects"
        );

        for effects in &pending.unmount {
            commit_hook_effect_list_unmount(HookFlags::PASSIVE, effects);
        }
        for effects in &pending.update {
            commit_hook_effect_list_unmount(HookFlags::PASSIVE | HookFlags::HAS_EFFECT, effects);
        }
        for effects in &pending.update {
            commit_hook_effect_list_mount(HookFlags::PASSIVE | HookFlags::HAS_EFFECT, effects);
        }

        self.process_inbox();
        true
    }
}
