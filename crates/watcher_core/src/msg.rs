use std::time::Duration;

use crate::ObservedState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Manual or boot start. `carry` seeds the observed state when present.
    Start { carry: Option<ObservedState> },
    /// A scheduled wakeup fired. `generation` is set by in-process timers and
    /// left empty by external ones that cannot know it.
    WakeupFired {
        carry: ObservedState,
        generation: Option<u64>,
    },
    /// Restore a durable wakeup that is not due yet.
    Resume {
        carry: ObservedState,
        remaining: Duration,
    },
    /// The cycle fetched and interpreted the status.
    CycleSucceeded { generation: u64, open: bool },
    /// The cycle could not produce a status.
    CycleFailed { generation: u64, reason: String },
    /// Explicit stop.
    Stop,
}
