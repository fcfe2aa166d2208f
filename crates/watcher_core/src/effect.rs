use std::time::Duration;

use crate::ObservedState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch and interpret the status for this cycle.
    BeginCycle { generation: u64 },
    /// The observed state changed.
    Notify { open: bool },
    ClearNotification,
    /// Transient, non-blocking message about a failed cycle.
    ReportFailure { message: String },
    /// Register the single pending wakeup, carrying `carry` forward.
    ArmWakeup {
        generation: u64,
        carry: ObservedState,
        delay: WakeupDelay,
    },
    /// Drop the pending wakeup, if the timer can still be reached.
    CancelWakeup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupDelay {
    /// The configured poll interval, read when the effect runs.
    PollInterval,
    /// Whatever was left of a restored wakeup.
    Remaining(Duration),
}
