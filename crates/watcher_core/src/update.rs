use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::{Effect, Msg, ObservedState, Phase, WakeupDelay, WatchState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: WatchState, msg: Msg) -> (WatchState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start { carry } => match state.phase() {
            Phase::Polling => {
                engine_debug!(cycle = state.generation(); "start ignored, a cycle is already in flight");
                Vec::new()
            }
            Phase::AwaitingWakeup => {
                let generation = state.begin_cycle(carry);
                engine_info!(cycle = generation; "manual start, polling ahead of the pending wakeup");
                vec![Effect::CancelWakeup, Effect::BeginCycle { generation }]
            }
            Phase::Idle => {
                let generation = state.begin_cycle(carry);
                engine_info!(cycle = generation; "engine starting with {} state", state.observed());
                vec![Effect::BeginCycle { generation }]
            }
        },
        Msg::WakeupFired { carry, generation } => {
            if generation.is_some_and(|fired| fired != state.generation()) {
                engine_debug!("stale wakeup {:?} ignored", generation);
                return (state, Vec::new());
            }
            match state.phase() {
                Phase::Polling => {
                    engine_debug!(cycle = state.generation(); "wakeup ignored, a cycle is already in flight");
                    Vec::new()
                }
                Phase::AwaitingWakeup | Phase::Idle => {
                    let generation = state.begin_cycle(Some(carry));
                    engine_debug!(cycle = generation; "wakeup fired carrying {}", carry);
                    vec![Effect::BeginCycle { generation }]
                }
            }
        }
        Msg::Resume { carry, remaining } => {
            if state.phase() != Phase::Idle {
                engine_debug!("resume ignored while {:?}", state.phase());
                return (state, Vec::new());
            }
            let generation = state.await_wakeup(carry);
            engine_info!(cycle = generation; "resuming, next poll in {:?}", remaining);
            vec![Effect::ArmWakeup {
                generation,
                carry,
                delay: WakeupDelay::Remaining(remaining),
            }]
        }
        Msg::CycleSucceeded { generation, open } => {
            if !state.is_current_cycle(generation) {
                engine_debug!(cycle = generation; "discarding stale result");
                return (state, Vec::new());
            }
            let previous = state.observed();
            let observed = ObservedState::from_open(open);
            engine_debug!(cycle = generation; "previous state is {}, current state is {}", previous, observed);

            let mut effects = Vec::with_capacity(2);
            if state.conclude_success(observed) {
                effects.push(Effect::Notify { open });
            }
            effects.push(Effect::ArmWakeup {
                generation,
                carry: observed,
                delay: WakeupDelay::PollInterval,
            });
            effects
        }
        Msg::CycleFailed { generation, reason } => {
            if !state.is_current_cycle(generation) {
                engine_debug!(cycle = generation; "discarding stale failure: {}", reason);
                return (state, Vec::new());
            }
            engine_warn!(cycle = generation; "failed to read current state: {}", reason);
            let carry = state.observed();
            state.conclude_failure(reason.clone());
            vec![
                Effect::ReportFailure { message: reason },
                Effect::ArmWakeup {
                    generation,
                    carry,
                    delay: WakeupDelay::PollInterval,
                },
            ]
        }
        Msg::Stop => {
            if state.phase() == Phase::Idle {
                return (state, Vec::new());
            }
            state.stop();
            engine_info!("engine stopping");
            vec![Effect::CancelWakeup, Effect::ClearNotification]
        }
    };

    (state, effects)
}
