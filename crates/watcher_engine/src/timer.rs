use std::sync::{Mutex, PoisonError};

use engine_logging::{engine_error, engine_trace};
use tokio_util::sync::CancellationToken;

use crate::{ScheduledWakeup, WakeupScheduler, WakeupTrigger};

/// Wakeups kept on the tokio runtime of the calling thread.
///
/// They do not survive the process; pair with a durable record when a restart
/// must pick up where the previous process left off.
#[derive(Debug, Default)]
pub struct InProcessTimer {
    pending: Mutex<Option<CancellationToken>>,
}

impl InProcessTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn swap_pending(&self, next: Option<CancellationToken>) {
        let previous = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *pending, next)
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

impl WakeupScheduler for InProcessTimer {
    fn register_wakeup(&self, wakeup: ScheduledWakeup, trigger: WakeupTrigger) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            engine_error!(cycle = wakeup.generation; "no tokio runtime to arm the wakeup on; polling stops here");
            return;
        };

        let token = CancellationToken::new();
        self.swap_pending(Some(token.clone()));

        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    engine_trace!(cycle = wakeup.generation; "wakeup cancelled");
                }
                _ = tokio::time::sleep(wakeup.delay) => {
                    engine_trace!(cycle = wakeup.generation; "wakeup due");
                    trigger.fire();
                }
            }
        });
    }

    fn cancel(&self) {
        self.swap_pending(None);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use watcher_core::{Msg, ObservedState};

    use super::*;
    use crate::engine::Command;

    fn armed(timer: &InProcessTimer, generation: u64, delay_ms: u64) -> mpsc::Receiver<Command> {
        let (tx, rx) = mpsc::channel();
        let wakeup = ScheduledWakeup {
            generation,
            delay: Duration::from_millis(delay_ms),
            carry: ObservedState::Closed,
        };
        timer.register_wakeup(wakeup, WakeupTrigger::new(tx, wakeup));
        rx
    }

    fn fired_generation(rx: &mpsc::Receiver<Command>) -> Option<u64> {
        match rx.recv_timeout(Duration::from_millis(500)).ok()? {
            Command::Dispatch(Msg::WakeupFired { generation, carry }) => {
                assert_eq!(carry, ObservedState::Closed);
                generation
            }
            _ => None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fires_after_delay() {
        let timer = InProcessTimer::new();
        let rx = armed(&timer, 3, 10);
        assert_eq!(fired_generation(&rx), Some(3));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_drops_pending_wakeup() {
        let timer = InProcessTimer::new();
        let rx = armed(&timer, 1, 50);
        timer.cancel();
        assert_eq!(fired_generation(&rx), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn registering_replaces_the_pending_wakeup() {
        let timer = InProcessTimer::new();
        let first = armed(&timer, 1, 50);
        let second = armed(&timer, 2, 10);
        assert_eq!(fired_generation(&second), Some(2));
        assert_eq!(fired_generation(&first), None);
    }

    #[test]
    fn without_runtime_nothing_is_armed() {
        let timer = InProcessTimer::new();
        let rx = armed(&timer, 1, 1);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
