use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use engine_logging::{engine_debug, engine_info, engine_warn};
use humantime_serde::re::humantime::{format_duration, parse_duration};
use watcher_core::{ObservedState, ResponsePolicy, SettingsDraft, WatcherSettings};
use watcher_engine::{
    Collaborators, EngineEvent, EngineHandle, FetchSettings, InProcessTimer, ReqwestFetcher,
    SettingsProvider, SharedSettings, TransitionNotifier,
};

use super::durable::{DurableScheduler, RecordFiles, RecordOnlyScheduler};
use super::notifier::DesktopNotifier;
use super::persistence::{
    clear_wakeup, load_settings_or_default, load_wakeup, render_settings, request_stop,
    save_settings, stop_requested, withdraw_stop, StateDir, WakeupRecord,
};
use super::settings_file::FileSettings;

const EVENT_WAIT: Duration = Duration::from_millis(250);
/// One-shot polls give up on a silent server instead of hanging a cron job.
const ONE_SHOT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ONE_SHOT_DEADLINE: Duration = Duration::from_secs(60);

/// Settings that can be changed with `settings set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SettingKey {
    PollUrl,
    PollInterval,
    OpenUrl,
    StartOnBoot,
    VibrateOnNotify,
    NotifySound,
    ResponsePolicy,
}

/// How a long-lived run picks up from the recorded wakeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Start(Option<ObservedState>),
    Resume {
        carry: ObservedState,
        remaining: Duration,
    },
}

fn plan_entry(
    record: Option<WakeupRecord>,
    carry: Option<ObservedState>,
    now: DateTime<Utc>,
) -> Entry {
    match record {
        Some(record) => match record.remaining(now) {
            Some(remaining) => Entry::Resume {
                carry: record.carry,
                remaining,
            },
            None => Entry::Start(Some(record.carry)),
        },
        None => Entry::Start(carry),
    }
}

/// Carry to poll with when a tick finds nothing pending; `None` while the
/// recorded wakeup is still in the future.
fn tick_due(record: Option<WakeupRecord>, now: DateTime<Utc>) -> Option<Option<ObservedState>> {
    match record {
        Some(record) if record.remaining(now).is_some() => None,
        Some(record) => Some(Some(record.carry)),
        None => Some(None),
    }
}

pub(crate) struct App {
    dir: StateDir,
}

impl App {
    pub(crate) fn new(dir: StateDir) -> Self {
        Self { dir }
    }

    /// Polls until Ctrl-C. Interrupting leaves the wakeup record in place so
    /// the next `run` resumes the schedule; `stop` from another shell ends it.
    pub(crate) fn run(&self, carry: Option<ObservedState>, boot: bool) -> Result<()> {
        let settings = self.settings()?;
        if boot && !settings.start_on_boot {
            engine_info!("start on boot is disabled, not watching");
            println!("Start on boot is disabled.");
            return Ok(());
        }
        self.dir.ensure()?;
        self.withdraw_stop()?;

        let provider: Arc<dyn SettingsProvider> =
            Arc::new(FileSettings::new(self.dir.settings_path(), settings));
        let notifier = Arc::new(DesktopNotifier::new(Arc::clone(&provider)));
        let scheduler = Arc::new(DurableScheduler::new(
            RecordFiles::in_dir(&self.dir),
            InProcessTimer::new(),
        ));

        let running = Arc::new(AtomicBool::new(true));
        let handler_flag = Arc::clone(&running);
        ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;

        self.watch(
            carry,
            Collaborators::new(provider, notifier).with_scheduler(scheduler),
            &running,
        )
    }

    /// Drives the engine until `running` drops or a stop marker shows up.
    fn watch(
        &self,
        carry: Option<ObservedState>,
        collaborators: Collaborators,
        running: &AtomicBool,
    ) -> Result<()> {
        let engine = EngineHandle::new(collaborators);
        let started = match plan_entry(self.recorded(), carry, Utc::now()) {
            Entry::Start(carry) => engine.start(carry),
            Entry::Resume { carry, remaining } => {
                println!("Resuming, next poll in {}.", whole_seconds(remaining));
                engine.resume(carry, remaining)
            }
        };
        started.context("Failed to start watching")?;

        let stop_path = self.dir.stop_path();
        while running.load(Ordering::SeqCst) {
            if stop_requested(&stop_path) {
                engine_info!("stop requested, stopping");
                engine.stop();
                break;
            }
            if let Some(event) = engine.recv_timeout(EVENT_WAIT) {
                report(&event);
            }
        }

        engine.shutdown();
        Ok(())
    }

    /// One cycle now; the next one is left to `tick`.
    pub(crate) fn poll(&self, carry: Option<ObservedState>) -> Result<()> {
        self.withdraw_stop()?;
        let carry = carry.or_else(|| self.recorded().map(|record| record.carry));
        self.poll_once(carry)
    }

    /// Polls only if the recorded wakeup is due or missing, and nobody
    /// stopped watching since the last `run` or `poll`.
    pub(crate) fn tick(&self) -> Result<()> {
        if stop_requested(&self.dir.stop_path()) {
            engine_debug!("stopped, tick ignored");
            println!("Stopped; `run` or `poll` resumes watching.");
            return Ok(());
        }
        let record = self.recorded();
        match tick_due(record, Utc::now()) {
            Some(carry) => self.poll_once(carry),
            None => {
                if let Some(remaining) = record.and_then(|record| record.remaining(Utc::now())) {
                    println!("Next poll due in {}.", whole_seconds(remaining));
                }
                Ok(())
            }
        }
    }

    pub(crate) fn stop(&self) -> Result<()> {
        let settings: Arc<dyn SettingsProvider> = Arc::new(SharedSettings::new(self.settings()?));
        self.stop_with(&DesktopNotifier::new(settings))
    }

    /// The marker goes down before the record is removed, so a wakeup being
    /// recorded concurrently either sees it or gets removed.
    fn stop_with(&self, notifier: &dyn TransitionNotifier) -> Result<()> {
        self.dir.ensure()?;
        request_stop(&self.dir.stop_path())?;
        if clear_wakeup(&self.dir.wakeup_path())? {
            notifier.clear();
            println!("Stopped watching.");
        } else {
            println!("No poll scheduled; a running watcher stops before its next one.");
        }
        Ok(())
    }

    pub(crate) fn status(&self, json: bool) -> Result<()> {
        let settings = self.settings()?;
        let record = load_wakeup(&self.dir.wakeup_path())?;
        let stopped = stop_requested(&self.dir.stop_path());
        let now = Utc::now();

        if json {
            let report = serde_json::json!({
                "watching": record.is_some() && !stopped,
                "stop_requested": stopped,
                "carry": record.map(|record| record.carry.as_str()),
                "due_utc": record.map(|record| record.due_utc.to_rfc3339()),
                "remaining_secs": record
                    .map(|record| record.remaining(now).map_or(0, |left| left.as_secs())),
                "poll_url": settings.poll_url,
                "poll_interval_secs": settings.effective_poll_interval().as_secs(),
            });
            let text = serde_json::to_string_pretty(&report).context("Failed to render status")?;
            println!("{text}");
            return Ok(());
        }

        match record {
            Some(record) => {
                println!("Watching {}", settings.poll_url);
                println!("Last known state: {}", record.carry);
                match record.remaining(now) {
                    Some(remaining) => println!(
                        "Next poll: {} (in {})",
                        record.due_utc.to_rfc3339(),
                        whole_seconds(remaining)
                    ),
                    None => println!("Next poll: due now"),
                }
            }
            None if stopped => println!("Stopped watching {}", settings.poll_url),
            None => println!("Not watching {}", settings.poll_url),
        }
        Ok(())
    }

    pub(crate) fn settings_show(&self) -> Result<()> {
        println!("{}", render_settings(&self.settings()?)?);
        Ok(())
    }

    pub(crate) fn settings_set(&self, key: SettingKey, value: &str) -> Result<()> {
        let mut draft = SettingsDraft::new(self.settings()?);
        apply_setting(&mut draft, key, value)?;
        match draft.commit() {
            Some(settings) => {
                self.dir.ensure()?;
                save_settings(&self.dir.settings_path(), &settings)
            }
            None => {
                println!("Unchanged.");
                Ok(())
            }
        }
    }

    pub(crate) fn settings_reset(&self) -> Result<()> {
        let mut draft = SettingsDraft::new(self.settings()?);
        let defaults = draft.reset();
        self.dir.ensure()?;
        save_settings(&self.dir.settings_path(), &defaults)
    }

    pub(crate) fn settings_init(&self) -> Result<()> {
        let path = self.dir.settings_path();
        if path.exists() {
            bail!("Settings file {:?} already exists", path);
        }
        self.dir.ensure()?;
        save_settings(&path, &WatcherSettings::default())?;
        println!("Wrote default settings to {:?}", path);
        Ok(())
    }

    fn withdraw_stop(&self) -> Result<()> {
        if withdraw_stop(&self.dir.stop_path())? {
            engine_info!("earlier stop withdrawn");
        }
        Ok(())
    }

    fn settings(&self) -> Result<WatcherSettings> {
        load_settings_or_default(&self.dir.settings_path())
    }

    /// A damaged record is treated as missing; the next armed wakeup rewrites it.
    fn recorded(&self) -> Option<WakeupRecord> {
        load_wakeup(&self.dir.wakeup_path())
            .inspect_err(|err| engine_warn!("Ignoring wakeup record: {:#}", err))
            .ok()
            .flatten()
    }

    fn poll_once(&self, carry: Option<ObservedState>) -> Result<()> {
        let settings = self.settings()?;
        self.dir.ensure()?;

        let provider: Arc<dyn SettingsProvider> =
            Arc::new(FileSettings::new(self.dir.settings_path(), settings));
        let notifier: Arc<dyn TransitionNotifier> =
            Arc::new(DesktopNotifier::new(Arc::clone(&provider)));
        let fetcher = ReqwestFetcher::new(FetchSettings {
            request_timeout: Some(ONE_SHOT_REQUEST_TIMEOUT),
            ..FetchSettings::default()
        });
        let engine = EngineHandle::new(
            Collaborators::new(provider, notifier)
                .with_scheduler(Arc::new(RecordOnlyScheduler::new(RecordFiles::in_dir(
                    &self.dir,
                ))))
                .with_fetcher(Arc::new(fetcher)),
        );

        engine.start(carry).context("Failed to poll")?;
        wait_for_wakeup(&engine, ONE_SHOT_DEADLINE)?;

        let status = engine.status();
        engine.shutdown();
        match status.last_failure {
            Some(reason) if status.consecutive_failures > 0 => {
                println!("Poll failed: {reason}");
            }
            _ => println!("The space is {}.", status.observed),
        }
        Ok(())
    }
}

fn wait_for_wakeup(engine: &EngineHandle, deadline: Duration) -> Result<()> {
    let started = Instant::now();
    while started.elapsed() < deadline {
        if let Some(event) = engine.recv_timeout(EVENT_WAIT) {
            report(&event);
            if matches!(event, EngineEvent::WakeupArmed { .. }) {
                return Ok(());
            }
        }
    }
    bail!("No poll result within {}", format_duration(deadline))
}

fn apply_setting(draft: &mut SettingsDraft, key: SettingKey, value: &str) -> Result<()> {
    match key {
        SettingKey::PollUrl => draft.set_poll_url(value)?,
        SettingKey::OpenUrl => draft.set_open_url(value)?,
        SettingKey::PollInterval => {
            let interval = parse_duration(value)
                .with_context(|| format!("Invalid duration `{value}`"))?;
            draft.set_poll_interval(interval);
            if draft.current().poll_interval != interval {
                eprintln!(
                    "Poll interval must be at least one second, using {}",
                    format_duration(draft.current().poll_interval)
                );
            }
        }
        SettingKey::StartOnBoot => draft.set_start_on_boot(parse_flag(value)?),
        SettingKey::VibrateOnNotify => draft.set_vibrate_on_notify(parse_flag(value)?),
        SettingKey::NotifySound => draft.set_notify_sound(value.trim()),
        SettingKey::ResponsePolicy => {
            let policy = value
                .parse::<ResponsePolicy>()
                .map_err(|err| anyhow::anyhow!("{err}"))?;
            draft.set_response_policy(policy);
        }
    }
    Ok(())
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => bail!("Expected true or false, got `{other}`"),
    }
}

fn whole_seconds(duration: Duration) -> String {
    format_duration(Duration::from_secs(duration.as_secs().max(1))).to_string()
}

fn report(event: &EngineEvent) {
    match event {
        EngineEvent::CycleStarted { generation, url } => {
            engine_debug!(cycle = generation; "polling {}", url);
        }
        EngineEvent::Notified { open } => {
            engine_info!("space is now {}", ObservedState::from_open(*open));
        }
        EngineEvent::CycleFailed { generation, reason } => {
            engine_debug!(cycle = generation; "poll failed: {}", reason);
        }
        EngineEvent::WakeupArmed {
            generation,
            delay,
            carry,
        } => {
            engine_info!(cycle = generation; "next poll in {} ({})", whole_seconds(*delay), carry);
        }
        EngineEvent::StatusChanged(view) => {
            engine_debug!("status {:?} observed {}", view.phase, view.observed);
        }
        EngineEvent::NotificationCleared | EngineEvent::WakeupCancelled => {
            engine_debug!("{:?}", event);
        }
    }
}
