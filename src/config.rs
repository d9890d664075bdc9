//! Engine configuration.

use crate::lanes::Lanes;

/// Slice length used by the reference scheduler, in milliseconds.
pub const DEFAULT_SLICE_MS: f64 = 5.0;

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// How long one macrotask turn may run before yielding.
    pub slice_ms: f64,
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self {
            slice_ms: DEFAULT_SLICE_MS,
        }
    }

    /// Override the slice length.
    pub fn with_slice_ms(mut self, slice_ms: f64) -> Self {
        self.slice_ms = slice_ms;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-root configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootConfig {
    /// Lane used by [`Root::render`](crate::Root::render).
    ///
    /// `SYNC` renders on the next microtask without time slicing.
    /// `DEFAULT` renders through the scheduler as a sliced task.
    pub render_lane: Lanes,
}

impl RootConfig {
    pub fn new() -> Self {
        Self {
            render_lane: Lanes::SYNC,
        }
    }

    /// Render root updates at `lane` instead of the sync lane.
    pub fn with_render_lane(mut self, lane: Lanes) -> Self {
        self.render_lane = lane.highest();
        self
    }
}

impl Default for RootConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
