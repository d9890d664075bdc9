//! Lane Model - bitset priorities for pending updates.
//!
//! Each lane is one bit. A lower bit is a more urgent lane, so the most
//! urgent lane of a set is its lowest set bit (`lanes & -lanes`).
//!
//! ```text
//!   IDLE  TRANSITION  DEFAULT  INPUT_CONTINUOUS  SYNC
//!   1     0           1        0                 1      = pending lanes
//!                                                ^ highest()
//! ```

use crate::scheduler::{Priority, Scheduler};

bitflags::bitflags! {
    /// A set of lanes. A single-bit value is one lane.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Lanes: u32 {
        const SYNC = 0b00001;
        const INPUT_CONTINUOUS = 0b00010;
        const DEFAULT = 0b00100;
        const TRANSITION = 0b01000;
        const IDLE = 0b10000;
    }
}

/// One lane. Same representation as a set with a single bit.
pub type Lane = Lanes;

/// The empty lane.
pub const NO_LANE: Lane = Lanes::empty();

impl Lanes {
    /// Merge any number of lane sets.
    pub fn merge(lanes: impl IntoIterator<Item = Lanes>) -> Lanes {
        lanes.into_iter().fold(Lanes::empty(), |acc, lane| acc | lane)
    }

    /// The most urgent lane in the set.
    pub fn highest(self) -> Lane {
        let bits = self.bits();
        Lanes::from_bits_retain(bits & bits.wrapping_neg())
    }

    /// Whether every lane of `subset` is in `self`.
    pub fn is_superset_of(self, subset: Lanes) -> bool {
        self & subset == subset
    }

    /// Whether the two sets share any lane.
    pub fn includes_some(self, other: Lanes) -> bool {
        self.intersects(other)
    }
}

/// Whether every lane of `subset` is in `set`.
pub fn is_subset_of_lanes(set: Lanes, subset: Lanes) -> bool {
    set.is_superset_of(subset)
}

/// Scheduler priority used to run work for `lanes`.
pub fn lanes_to_scheduler_priority(lanes: Lanes) -> Priority {
    let lane = lanes.highest();
    if lane == Lanes::SYNC {
        Priority::Immediate
    } else if lane == Lanes::INPUT_CONTINUOUS {
        Priority::UserBlocking
    } else if lane == Lanes::DEFAULT {
        Priority::Normal
    } else {
        Priority::Idle
    }
}

/// Lane matching a scheduler priority. Low and idle work share [`Lanes::IDLE`].
pub fn scheduler_priority_to_lane(priority: Priority) -> Lane {
    match priority {
        Priority::Immediate => Lanes::SYNC,
        Priority::UserBlocking => Lanes::INPUT_CONTINUOUS,
        Priority::Normal => Lanes::DEFAULT,
        Priority::Low | Priority::Idle => Lanes::IDLE,
        Priority::NoPriority => NO_LANE,
    }
}

/// Lane for an update requested now: the transition lane inside a transition
/// batch, otherwise the lane of the ambient scheduler priority.
pub fn request_update_lane(scheduler: &Scheduler) -> Lane {
    if scheduler.is_in_transition() {
        return Lanes::TRANSITION;
    }
    scheduler_priority_to_lane(scheduler.current_priority())
}

// =============================================================================
// Tests
// =============================================================================
