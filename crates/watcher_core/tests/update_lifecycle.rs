use std::sync::Once;
use std::time::Duration;

use pretty_assertions::assert_eq;
use watcher_core::{update, Effect, Msg, ObservedState, Phase, WakeupDelay, WatchState};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn started(carry: Option<ObservedState>) -> (WatchState, u64) {
    let (state, effects) = update(WatchState::new(), Msg::Start { carry });
    let generation = state.generation();
    assert_eq!(effects, vec![Effect::BeginCycle { generation }]);
    (state, generation)
}

#[test]
fn start_from_idle_polls_immediately() {
    init_logging();
    let (state, generation) = started(None);

    let view = state.view();
    assert_eq!(view.phase, Phase::Polling);
    assert_eq!(view.observed, ObservedState::Unknown);
    assert_eq!(state.active_generation(), Some(generation));
    assert!(view.dirty);
}

#[test]
fn start_seeds_carried_state() {
    init_logging();
    let (state, _) = started(Some(ObservedState::Closed));
    assert_eq!(state.observed(), ObservedState::Closed);
}

#[test]
fn second_start_while_polling_is_ignored() {
    init_logging();
    let (state, generation) = started(None);

    let (state, effects) = update(
        state,
        Msg::Start {
            carry: Some(ObservedState::Open),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.generation(), generation);
    assert_eq!(state.observed(), ObservedState::Unknown);
}

#[test]
fn start_while_awaiting_cancels_pending_wakeup() {
    init_logging();
    let (state, generation) = started(None);
    let (state, _) = update(
        state,
        Msg::CycleSucceeded {
            generation,
            open: true,
        },
    );
    assert_eq!(state.phase(), Phase::AwaitingWakeup);

    let (state, effects) = update(state, Msg::Start { carry: None });
    let next = state.generation();
    assert!(next > generation);
    assert_eq!(
        effects,
        vec![Effect::CancelWakeup, Effect::BeginCycle { generation: next }]
    );
    assert_eq!(state.observed(), ObservedState::Open);
}

#[test]
fn stop_twice_from_idle_has_no_effect() {
    init_logging();
    let idle = WatchState::new();

    let (once, effects) = update(idle.clone(), Msg::Stop);
    assert!(effects.is_empty());
    let (twice, effects) = update(once.clone(), Msg::Stop);
    assert!(effects.is_empty());

    assert_eq!(once, idle);
    assert_eq!(twice, idle);
}

#[test]
fn stop_clears_state_and_notification() {
    init_logging();
    let (state, generation) = started(Some(ObservedState::Open));

    let (mut state, effects) = update(state, Msg::Stop);

    assert_eq!(effects, vec![Effect::CancelWakeup, Effect::ClearNotification]);
    assert_eq!(state.phase(), Phase::Idle);
    assert_eq!(state.observed(), ObservedState::Unknown);
    assert_eq!(state.active_generation(), None);
    assert!(state.generation() > generation);
    assert!(state.consume_dirty());

    let (state, effects) = update(state, Msg::Stop);
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Idle);
}

#[test]
fn result_arriving_after_stop_is_discarded() {
    init_logging();
    let (state, generation) = started(None);
    let (state, _) = update(state, Msg::Stop);

    let (state, effects) = update(
        state,
        Msg::CycleSucceeded {
            generation,
            open: true,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.observed(), ObservedState::Unknown);

    let (state, effects) = update(
        state,
        Msg::CycleFailed {
            generation,
            reason: "connection reset".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().last_failure, None);
}

#[test]
fn result_from_previous_cycle_is_discarded_after_restart() {
    init_logging();
    let (state, first) = started(None);
    let (state, _) = update(state, Msg::Stop);
    let (state, _) = update(state, Msg::Start { carry: None });
    let second = state.generation();

    let (state, effects) = update(
        state,
        Msg::CycleSucceeded {
            generation: first,
            open: true,
        },
    );
    assert!(effects.is_empty());
    assert!(state.is_current_cycle(second));
}

#[test]
fn stale_wakeup_is_ignored() {
    init_logging();
    let (state, generation) = started(None);
    let (state, _) = update(
        state,
        Msg::CycleSucceeded {
            generation,
            open: false,
        },
    );
    let (state, _) = update(state, Msg::Stop);

    let (state, effects) = update(
        state,
        Msg::WakeupFired {
            carry: ObservedState::Closed,
            generation: Some(generation),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Idle);
}

#[test]
fn external_wakeup_after_stop_restarts_polling() {
    init_logging();
    let (state, _) = started(None);
    let (state, _) = update(state, Msg::Stop);

    let (state, effects) = update(
        state,
        Msg::WakeupFired {
            carry: ObservedState::Open,
            generation: None,
        },
    );
    assert_eq!(
        effects,
        vec![Effect::BeginCycle {
            generation: state.generation()
        }]
    );
    assert_eq!(state.observed(), ObservedState::Open);
}

#[test]
fn wakeup_while_polling_is_ignored() {
    init_logging();
    let (state, generation) = started(None);
    let (state, effects) = update(
        state,
        Msg::WakeupFired {
            carry: ObservedState::Open,
            generation: None,
        },
    );
    assert!(effects.is_empty());
    assert!(state.is_current_cycle(generation));
}

#[test]
fn resume_arms_remaining_delay() {
    init_logging();
    let remaining = Duration::from_secs(42);
    let (state, effects) = update(
        WatchState::new(),
        Msg::Resume {
            carry: ObservedState::Closed,
            remaining,
        },
    );
    assert_eq!(state.phase(), Phase::AwaitingWakeup);
    assert_eq!(state.observed(), ObservedState::Closed);
    assert_eq!(
        effects,
        vec![Effect::ArmWakeup {
            generation: state.generation(),
            carry: ObservedState::Closed,
            delay: WakeupDelay::Remaining(remaining),
        }]
    );

    let (_, effects) = update(
        state,
        Msg::Resume {
            carry: ObservedState::Open,
            remaining,
        },
    );
    assert!(effects.is_empty());
}
