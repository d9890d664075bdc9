//! Task priorities and their timeouts.

/// Largest 31-bit signed integer. Idle work effectively never expires.
pub const MAX_SIGNED_31_BIT_INT: f64 = 1_073_741_823.0;

/// Priority of a scheduler task. Lower value is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    NoPriority = 0,
    Immediate = 1,
    UserBlocking = 2,
    #[default]
    Normal = 3,
    Low = 4,
    Idle = 5,
}

impl Priority {
    /// Milliseconds between a task's start time and its deadline.
    ///
    /// Immediate work has a negative timeout, so its deadline is already past.
    pub fn timeout(self) -> f64 {
        match self {
            Priority::NoPriority => 5000.0,
            Priority::Immediate => -1.0,
            Priority::UserBlocking => 250.0,
            Priority::Normal => 5000.0,
            Priority::Low => 10000.0,
            Priority::Idle => MAX_SIGNED_31_BIT_INT,
        }
    }
}
