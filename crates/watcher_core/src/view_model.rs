use crate::{ObservedState, Phase};

/// Read-only snapshot of the poll scheduler for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchStatusView {
    pub phase: Phase,
    pub observed: ObservedState,
    pub generation: u64,
    /// Cycles concluded since the process started, failed ones included.
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub last_failure: Option<String>,
    pub dirty: bool,
}
