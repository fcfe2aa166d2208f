use crate::view_model::WatchStatusView;
use crate::ObservedState;

/// Where the poll loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing running and nothing scheduled.
    #[default]
    Idle,
    /// A fetch is in flight.
    Polling,
    /// The last cycle concluded; exactly one wakeup is pending.
    AwaitingWakeup,
}

/// State owned by the poll scheduler.
///
/// Every cycle and every stop bumps `generation`, so completions and wakeups
/// tagged with an older generation can be told apart from current ones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchState {
    phase: Phase,
    observed: ObservedState,
    generation: u64,
    cycles: u64,
    consecutive_failures: u32,
    last_failure: Option<String>,
    dirty: bool,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn observed(&self) -> ObservedState {
        self.observed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation owning the running cycle or pending wakeup, if any.
    pub fn active_generation(&self) -> Option<u64> {
        (self.phase != Phase::Idle).then_some(self.generation)
    }

    /// True when `generation` names the cycle that is in flight right now.
    pub fn is_current_cycle(&self, generation: u64) -> bool {
        self.phase == Phase::Polling && self.generation == generation
    }

    pub fn view(&self) -> WatchStatusView {
        WatchStatusView {
            phase: self.phase,
            observed: self.observed,
            generation: self.generation,
            cycles: self.cycles,
            consecutive_failures: self.consecutive_failures,
            last_failure: self.last_failure.clone(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn begin_cycle(&mut self, carry: Option<ObservedState>) -> u64 {
        if let Some(carry) = carry {
            self.observed = carry;
        }
        self.generation += 1;
        self.phase = Phase::Polling;
        self.dirty = true;
        self.generation
    }

    /// Records a successful poll. Returns true when the state changed.
    pub(crate) fn conclude_success(&mut self, observed: ObservedState) -> bool {
        let changed = self.observed != observed;
        self.observed = observed;
        self.phase = Phase::AwaitingWakeup;
        self.cycles += 1;
        self.consecutive_failures = 0;
        self.last_failure = None;
        self.dirty = true;
        changed
    }

    pub(crate) fn conclude_failure(&mut self, reason: String) {
        self.phase = Phase::AwaitingWakeup;
        self.cycles += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(reason);
        self.dirty = true;
    }

    pub(crate) fn await_wakeup(&mut self, carry: ObservedState) -> u64 {
        self.observed = carry;
        self.generation += 1;
        self.phase = Phase::AwaitingWakeup;
        self.dirty = true;
        self.generation
    }

    pub(crate) fn stop(&mut self) {
        self.phase = Phase::Idle;
        self.observed = ObservedState::Unknown;
        self.generation += 1;
        self.consecutive_failures = 0;
        self.dirty = true;
    }
}
