use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info};
use watcher_core::{
    interpret, update, Effect, Msg, ObservedState, WakeupDelay, WatchState, WatchStatusView,
};

use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::timer::InProcessTimer;
use crate::{
    EngineEvent, PollTarget, ScheduledWakeup, SettingsProvider, TargetError, TransitionNotifier,
    WakeupScheduler, WakeupTrigger,
};

const WORKER_THREAD_NAME: &str = "watcher_engine";

pub(crate) enum Command {
    Dispatch(Msg),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    MalformedTarget(#[from] TargetError),
    #[error("engine has shut down")]
    ShutDown,
}

/// Everything the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub settings: Arc<dyn SettingsProvider>,
    pub notifier: Arc<dyn TransitionNotifier>,
    pub scheduler: Arc<dyn WakeupScheduler>,
    pub fetcher: Arc<dyn Fetcher>,
}

impl Collaborators {
    /// Production wiring: reqwest fetcher and in-process wakeups.
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        notifier: Arc<dyn TransitionNotifier>,
    ) -> Self {
        Self {
            settings,
            notifier,
            scheduler: Arc::new(InProcessTimer::new()),
            fetcher: Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn WakeupScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }
}

/// Start/stop surface of a running engine.
pub(crate) struct EngineControl {
    cmd_tx: mpsc::Sender<Command>,
    settings: Arc<dyn SettingsProvider>,
}

impl EngineControl {
    /// Starts polling immediately. Ignored while a cycle is in flight.
    pub fn start(&self, carry: Option<ObservedState>) -> Result<(), EngineError> {
        self.check_target()?;
        self.send(Msg::Start { carry })
    }

    /// Re-entry for external timers that fired with `carry`.
    pub fn wakeup(&self, carry: ObservedState) -> Result<(), EngineError> {
        self.check_target()?;
        self.send(Msg::WakeupFired {
            carry,
            generation: None,
        })
    }

    /// Arms a wakeup `remaining` from now without polling first.
    pub fn resume(&self, carry: ObservedState, remaining: Duration) -> Result<(), EngineError> {
        self.check_target()?;
        self.send(Msg::Resume { carry, remaining })
    }

    /// Stops polling. Safe to call when already stopped.
    pub fn stop(&self) {
        let _ = self.send(Msg::Stop);
    }

    fn check_target(&self) -> Result<PollTarget, EngineError> {
        let target = PollTarget::status(&self.settings.poll_url()).inspect_err(|err| {
            engine_error!("refusing to start: {}", err);
        })?;
        Ok(target)
    }

    fn send(&self, msg: Msg) -> Result<(), EngineError> {
        self.cmd_tx
            .send(Command::Dispatch(msg))
            .map_err(|_| EngineError::ShutDown)
    }
}

/// Owns the engine thread. Dropping the handle shuts the engine down.
pub struct EngineHandle {
    control: EngineControl,
    event_rx: mpsc::Receiver<EngineEvent>,
    status: Arc<Mutex<WatchStatusView>>,
    worker: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new(collaborators: Collaborators) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let status = Arc::new(Mutex::new(WatchStatusView::default()));

        let control = EngineControl {
            cmd_tx: cmd_tx.clone(),
            settings: Arc::clone(&collaborators.settings),
        };
        let driver = Driver {
            state: WatchState::new(),
            active: Arc::new(AtomicU64::new(0)),
            collaborators,
            cmd_tx,
            event_tx,
            status: Arc::clone(&status),
        };

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || driver.run(cmd_rx))
            .inspect_err(|err| engine_error!("failed to spawn engine thread: {}", err))
            .ok();

        Self {
            control,
            event_rx,
            status,
            worker,
        }
    }

    pub fn start(&self, carry: Option<ObservedState>) -> Result<(), EngineError> {
        self.control.start(carry)
    }

    pub fn wakeup(&self, carry: ObservedState) -> Result<(), EngineError> {
        self.control.wakeup(carry)
    }

    pub fn resume(&self, carry: ObservedState, remaining: Duration) -> Result<(), EngineError> {
        self.control.resume(carry, remaining)
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    /// Latest published status.
    pub fn status(&self) -> WatchStatusView {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Ends the engine thread without stopping: nothing is cleared or
    /// cancelled beyond what dies with the process.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let _ = self.control.cmd_tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                engine_error!("engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.join();
    }
}

struct Driver {
    state: WatchState,
    /// Generation that may still fetch or arm; 0 while idle.
    active: Arc<AtomicU64>,
    collaborators: Collaborators,
    cmd_tx: mpsc::Sender<Command>,
    event_tx: mpsc::Sender<EngineEvent>,
    status: Arc<Mutex<WatchStatusView>>,
}

impl Driver {
    fn run(mut self, cmd_rx: mpsc::Receiver<Command>) {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                engine_error!("failed to build tokio runtime: {}", err);
                return;
            }
        };
        // Lets effects spawn cycle tasks and in-process timers from this thread.
        let _guard = runtime.enter();

        while let Ok(command) = cmd_rx.recv() {
            match command {
                Command::Dispatch(msg) => self.dispatch(msg),
                Command::Shutdown => break,
            }
        }
        engine_debug!("engine loop finished");
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);

        self.active
            .store(state.active_generation().unwrap_or(0), Ordering::SeqCst);
        if state.consume_dirty() {
            let view = state.view();
            *self.status.lock().unwrap_or_else(PoisonError::into_inner) = view.clone();
            self.emit(EngineEvent::StatusChanged(view));
        }
        self.state = state;

        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::BeginCycle { generation } => self.begin_cycle(generation),
            Effect::Notify { open } => {
                engine_info!("showing notification for {}", ObservedState::from_open(open));
                self.collaborators.notifier.notify(open);
                self.emit(EngineEvent::Notified { open });
            }
            Effect::ClearNotification => {
                self.collaborators.notifier.clear();
                self.emit(EngineEvent::NotificationCleared);
            }
            Effect::ReportFailure { message } => {
                self.collaborators.notifier.notice(&message);
                self.emit(EngineEvent::CycleFailed {
                    generation: self.state.generation(),
                    reason: message,
                });
            }
            Effect::ArmWakeup {
                generation,
                carry,
                delay,
            } => self.arm_wakeup(generation, carry, delay),
            Effect::CancelWakeup => {
                self.collaborators.scheduler.cancel();
                self.emit(EngineEvent::WakeupCancelled);
            }
        }
    }

    fn begin_cycle(&mut self, generation: u64) {
        let url = self.collaborators.settings.poll_url();
        let target = match PollTarget::status(&url) {
            Ok(target) => target,
            Err(err) => {
                let _ = self.cmd_tx.send(Command::Dispatch(Msg::CycleFailed {
                    generation,
                    reason: err.to_string(),
                }));
                return;
            }
        };

        self.emit(EngineEvent::CycleStarted {
            generation,
            url: target.url().to_string(),
        });

        let fetcher = Arc::clone(&self.collaborators.fetcher);
        let settings = Arc::clone(&self.collaborators.settings);
        let active = Arc::clone(&self.active);
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let outcome =
                run_cycle(generation, &target, fetcher.as_ref(), settings.as_ref(), &active).await;
            if let Some(msg) = outcome {
                let _ = cmd_tx.send(Command::Dispatch(msg));
            }
        });
    }

    fn arm_wakeup(&mut self, generation: u64, carry: ObservedState, delay: WakeupDelay) {
        if self.active.load(Ordering::SeqCst) != generation {
            engine_debug!(cycle = generation; "engine stopped before the next poll was scheduled");
            return;
        }
        let delay = match delay {
            WakeupDelay::PollInterval => self.collaborators.settings.poll_interval(),
            WakeupDelay::Remaining(remaining) => remaining,
        };
        let wakeup = ScheduledWakeup {
            generation,
            delay,
            carry,
        };
        engine_debug!(cycle = generation; "next poll in {:?} carrying {}", delay, carry);

        let trigger = WakeupTrigger::new(self.cmd_tx.clone(), wakeup);
        self.collaborators.scheduler.register_wakeup(wakeup, trigger);
        self.emit(EngineEvent::WakeupArmed {
            generation,
            delay,
            carry,
        });
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// One poll: fetch, interpret, report. `None` when the engine moved on first.
async fn run_cycle(
    generation: u64,
    target: &PollTarget,
    fetcher: &dyn Fetcher,
    settings: &dyn SettingsProvider,
    active: &AtomicU64,
) -> Option<Msg> {
    if active.load(Ordering::SeqCst) != generation {
        engine_debug!(cycle = generation; "worker aborting as engine has been stopped");
        return None;
    }

    engine_debug!(cycle = generation; "checking state with {}", target);
    let msg = match fetcher.fetch(target).await {
        Ok(text) => match interpret(&text, settings.response_policy()) {
            Ok(open) => Msg::CycleSucceeded { generation, open },
            Err(err) => Msg::CycleFailed {
                generation,
                reason: err.to_string(),
            },
        },
        Err(err) => Msg::CycleFailed {
            generation,
            reason: format!("failed to read current state from {}: {}", target.url(), err),
        },
    };
    Some(msg)
}
