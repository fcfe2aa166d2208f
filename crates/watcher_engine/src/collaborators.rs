//! Narrow interfaces the engine consumes: settings, notifications and the
//! wakeup timer.

use std::sync::{mpsc, Arc, PoisonError, RwLock};
use std::time::Duration;

use engine_logging::engine_warn;
use watcher_core::{Msg, ObservedState, ResponsePolicy, WatcherSettings};

use crate::engine::Command;

/// Source of the current settings.
///
/// Every accessor reads afresh; a value may change between two reads of the
/// same cycle and the later read wins.
pub trait SettingsProvider: Send + Sync {
    fn current(&self) -> WatcherSettings;

    fn poll_url(&self) -> String {
        self.current().poll_url
    }

    /// Never below one second.
    fn poll_interval(&self) -> Duration {
        self.current().effective_poll_interval()
    }

    fn open_target_url(&self) -> String {
        self.current().open_url
    }

    fn vibrate_on_notify(&self) -> bool {
        self.current().vibrate_on_notify
    }

    fn notify_sound(&self) -> String {
        self.current().notify_sound
    }

    fn response_policy(&self) -> ResponsePolicy {
        self.current().response_policy
    }
}

/// In-memory settings shared between an editor and the engine.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<WatcherSettings>>,
}

impl SharedSettings {
    pub fn new(settings: WatcherSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn replace(&self, settings: WatcherSettings) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn update(&self, edit: impl FnOnce(&mut WatcherSettings)) {
        edit(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl SettingsProvider for SharedSettings {
    fn current(&self) -> WatcherSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Renders state changes to the user. Results are never inspected.
pub trait TransitionNotifier: Send + Sync {
    /// The observed state changed to open (`true`) or closed (`false`).
    fn notify(&self, open: bool);

    /// Remove whatever `notify` put up.
    fn clear(&self);

    /// Transient, non-blocking message such as a failed poll.
    fn notice(&self, message: &str) {
        engine_warn!("{}", message);
    }
}

/// A wakeup the engine wants armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledWakeup {
    pub generation: u64,
    pub delay: Duration,
    pub carry: ObservedState,
}

/// Re-enters the engine when a wakeup is due.
#[derive(Debug, Clone)]
pub struct WakeupTrigger {
    tx: mpsc::Sender<Command>,
    wakeup: ScheduledWakeup,
}

impl WakeupTrigger {
    pub(crate) fn new(tx: mpsc::Sender<Command>, wakeup: ScheduledWakeup) -> Self {
        Self { tx, wakeup }
    }

    pub fn wakeup(&self) -> ScheduledWakeup {
        self.wakeup
    }

    /// Starts the next cycle. Harmless once the engine moved on or shut down.
    pub fn fire(&self) {
        let _ = self.tx.send(Command::Dispatch(Msg::WakeupFired {
            carry: self.wakeup.carry,
            generation: Some(self.wakeup.generation),
        }));
    }
}

/// External timer facility. Holds at most one pending wakeup.
pub trait WakeupScheduler: Send + Sync {
    /// Arms `wakeup`, replacing any pending one; call `trigger.fire()` when due.
    fn register_wakeup(&self, wakeup: ScheduledWakeup, trigger: WakeupTrigger);

    /// Drops the pending wakeup if it has not fired yet.
    fn cancel(&self);
}
