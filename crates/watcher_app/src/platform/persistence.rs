use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use engine_logging::{engine_debug, engine_info, LOG_FILE_NAME};
use serde::{Deserialize, Serialize};
use watcher_core::{ObservedState, ResponsePolicy, WatcherSettings};
use watcher_engine::{ensure_state_dir, read_optional, remove_if_exists, write_atomically};

const SETTINGS_FILENAME: &str = "settings.ron";
const WAKEUP_FILENAME: &str = "wakeup.ron";
const STOP_FILENAME: &str = "stop-requested";
const STATE_DIR_NAME: &str = "space-watcher";

/// Directory holding the settings file, the wakeup record, the stop marker
/// and the log of `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// `$HOME/.config/space-watcher`, or the working directory without a home.
    pub(crate) fn default_location() -> Self {
        let root = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config").join(STATE_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("."));
        Self { root }
    }

    pub(crate) fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILENAME)
    }

    pub(crate) fn wakeup_path(&self) -> PathBuf {
        self.root.join(WAKEUP_FILENAME)
    }

    pub(crate) fn stop_path(&self) -> PathBuf {
        self.root.join(STOP_FILENAME)
    }

    pub(crate) fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE_NAME)
    }

    pub(crate) fn ensure(&self) -> Result<()> {
        ensure_state_dir(&self.root)
            .with_context(|| format!("Failed to prepare state directory {:?}", self.root))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct PersistedSettings {
    poll_url: String,
    #[serde(with = "humantime_serde")]
    poll_interval: Duration,
    open_url: String,
    start_on_boot: bool,
    vibrate_on_notify: bool,
    notify_sound: String,
    response_policy: String,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self::from(&WatcherSettings::default())
    }
}

impl From<&WatcherSettings> for PersistedSettings {
    fn from(settings: &WatcherSettings) -> Self {
        Self {
            poll_url: settings.poll_url.clone(),
            poll_interval: settings.poll_interval,
            open_url: settings.open_url.clone(),
            start_on_boot: settings.start_on_boot,
            vibrate_on_notify: settings.vibrate_on_notify,
            notify_sound: settings.notify_sound.clone(),
            response_policy: settings.response_policy.as_str().to_string(),
        }
    }
}

impl TryFrom<PersistedSettings> for WatcherSettings {
    type Error = anyhow::Error;

    fn try_from(persisted: PersistedSettings) -> Result<Self> {
        let response_policy = persisted
            .response_policy
            .parse::<ResponsePolicy>()
            .map_err(|err| anyhow!("{err}"))?;
        Ok(Self {
            poll_url: persisted.poll_url,
            poll_interval: persisted.poll_interval,
            open_url: persisted.open_url,
            start_on_boot: persisted.start_on_boot,
            vibrate_on_notify: persisted.vibrate_on_notify,
            notify_sound: persisted.notify_sound,
            response_policy,
        })
    }
}

/// Reads the settings file; `None` when it has not been written yet.
/// Fields missing from the file take their default values.
pub(crate) fn load_settings(path: &Path) -> Result<Option<WatcherSettings>> {
    let Some(content) = read_optional(path)? else {
        return Ok(None);
    };
    let persisted: PersistedSettings = ron::from_str(&content)
        .with_context(|| format!("Failed to parse settings from {:?}", path))?;
    let settings = WatcherSettings::try_from(persisted)
        .with_context(|| format!("Invalid settings in {:?}", path))?;
    engine_debug!("Loaded settings from {:?}", path);
    Ok(Some(settings))
}

/// Settings from `path`, or the defaults when the file does not exist.
pub(crate) fn load_settings_or_default(path: &Path) -> Result<WatcherSettings> {
    Ok(load_settings(path)?.unwrap_or_default())
}

pub(crate) fn render_settings(settings: &WatcherSettings) -> Result<String> {
    let pretty = ron::ser::PrettyConfig::new();
    ron::ser::to_string_pretty(&PersistedSettings::from(settings), pretty)
        .context("Failed to serialize settings")
}

pub(crate) fn save_settings(path: &Path, settings: &WatcherSettings) -> Result<()> {
    let content = render_settings(settings)?;
    write_atomically(path, &content)
        .with_context(|| format!("Failed to write settings to {:?}", path))?;
    engine_info!("Saved settings to {:?}", path);
    Ok(())
}

/// The next poll the previous process promised, kept across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WakeupRecord {
    pub due_utc: DateTime<Utc>,
    pub carry: ObservedState,
}

impl WakeupRecord {
    pub(crate) fn after(now: DateTime<Utc>, delay: Duration, carry: ObservedState) -> Self {
        let due_utc = TimeDelta::from_std(delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { due_utc, carry }
    }

    /// Time left until the wakeup is due; `None` once it is due.
    pub(crate) fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.due_utc - now)
            .to_std()
            .ok()
            .filter(|remaining| !remaining.is_zero())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedWakeup {
    due_utc: DateTime<Utc>,
    carry: String,
}

pub(crate) fn load_wakeup(path: &Path) -> Result<Option<WakeupRecord>> {
    let Some(content) = read_optional(path)? else {
        return Ok(None);
    };
    let persisted: PersistedWakeup = ron::from_str(&content)
        .with_context(|| format!("Failed to parse wakeup record from {:?}", path))?;
    let carry = persisted
        .carry
        .parse::<ObservedState>()
        .with_context(|| format!("Invalid carried state in {:?}", path))?;
    Ok(Some(WakeupRecord {
        due_utc: persisted.due_utc,
        carry,
    }))
}

pub(crate) fn save_wakeup(path: &Path, record: &WakeupRecord) -> Result<()> {
    let persisted = PersistedWakeup {
        due_utc: record.due_utc,
        carry: record.carry.as_str().to_string(),
    };
    let content = ron::ser::to_string_pretty(&persisted, ron::ser::PrettyConfig::new())
        .context("Failed to serialize wakeup record")?;
    write_atomically(path, &content)
        .with_context(|| format!("Failed to write wakeup record to {:?}", path))
}

/// Removes the wakeup record. Returns whether there was one.
pub(crate) fn clear_wakeup(path: &Path) -> Result<bool> {
    remove_if_exists(path).with_context(|| format!("Failed to remove wakeup record {:?}", path))
}

/// Leaves the marker that tells a running watcher to stop and keeps any
/// later wakeup from being recorded.
pub(crate) fn request_stop(path: &Path) -> Result<()> {
    write_atomically(path, &Utc::now().to_rfc3339())
        .with_context(|| format!("Failed to write stop marker {:?}", path))
}

pub(crate) fn stop_requested(path: &Path) -> bool {
    path.exists()
}

/// Removes the stop marker. Returns whether there was one.
pub(crate) fn withdraw_stop(path: &Path) -> Result<bool> {
    remove_if_exists(path).with_context(|| format!("Failed to remove stop marker {:?}", path))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_settings_file_reads_as_none() {
        let temp = TempDir::new().unwrap();
        let dir = StateDir::new(temp.path().to_path_buf());
        assert_eq!(load_settings(&dir.settings_path()).unwrap(), None);
        assert_eq!(
            load_settings_or_default(&dir.settings_path()).unwrap(),
            WatcherSettings::default()
        );
    }

    #[test]
    fn saved_settings_load_back() {
        let temp = TempDir::new().unwrap();
        let dir = StateDir::new(temp.path().join("nested"));
        let settings = WatcherSettings {
            poll_interval: Duration::from_secs(90),
            notify_sound: "bell.oga".to_string(),
            response_policy: ResponsePolicy::Strict,
            ..WatcherSettings::default()
        };

        save_settings(&dir.settings_path(), &settings).unwrap();
        assert_eq!(load_settings(&dir.settings_path()).unwrap(), Some(settings));
    }

    #[test]
    fn partial_settings_file_fills_in_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILENAME);
        fs::write(&path, "(poll_interval: \"1m\", start_on_boot: false)").unwrap();

        let settings = load_settings(&path).unwrap().unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(60));
        assert!(!settings.start_on_boot);
        assert_eq!(settings.poll_url, watcher_core::DEFAULT_POLL_URL);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILENAME);
        fs::write(&path, "(response_policy: \"lenient\")").unwrap();

        let err = load_settings(&path).unwrap_err();
        assert!(format!("{err:#}").contains("lenient"), "{err:#}");
    }

    #[test]
    fn wakeup_record_survives_a_restart() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(WAKEUP_FILENAME);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = WakeupRecord::after(now, Duration::from_secs(180), ObservedState::Open);

        save_wakeup(&path, &record).unwrap();
        let loaded = load_wakeup(&path).unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(
            loaded.due_utc,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 3, 0).unwrap()
        );

        assert!(clear_wakeup(&path).unwrap());
        assert!(!clear_wakeup(&path).unwrap());
        assert_eq!(load_wakeup(&path).unwrap(), None);
    }

    #[test]
    fn stop_marker_comes_and_goes() {
        let temp = TempDir::new().unwrap();
        let dir = StateDir::new(temp.path().join("state"));
        assert!(!stop_requested(&dir.stop_path()));

        request_stop(&dir.stop_path()).unwrap();
        assert!(stop_requested(&dir.stop_path()));

        assert!(withdraw_stop(&dir.stop_path()).unwrap());
        assert!(!withdraw_stop(&dir.stop_path()).unwrap());
        assert!(!stop_requested(&dir.stop_path()));
    }

    #[test]
    fn remaining_counts_down_to_due() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = WakeupRecord::after(now, Duration::from_secs(60), ObservedState::Closed);

        assert_eq!(record.remaining(now), Some(Duration::from_secs(60)));
        assert_eq!(
            record.remaining(now + TimeDelta::seconds(45)),
            Some(Duration::from_secs(15))
        );
        assert_eq!(record.remaining(now + TimeDelta::seconds(60)), None);
        assert_eq!(record.remaining(now + TimeDelta::seconds(600)), None);
    }
}
