use std::time::Duration;

use engine_logging::engine_error;
use url::Url;

use crate::ResponsePolicy;

pub const DEFAULT_POLL_URL: &str = "http://techinc.nl/space/spacestate";
pub const DEFAULT_OPEN_URL: &str = "http://techinc.nl/";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3 * 60);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_START_ON_BOOT: bool = true;
pub const DEFAULT_VIBRATE_ON_NOTIFY: bool = false;

/// User adjustable settings of the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherSettings {
    /// Endpoint answering `open` or `closed` on its first line.
    pub poll_url: String,
    /// Delay between the end of one poll and the start of the next.
    pub poll_interval: Duration,
    /// Page offered when the user follows a notification.
    pub open_url: String,
    pub start_on_boot: bool,
    pub vibrate_on_notify: bool,
    /// Sound played with a notification; empty for none.
    pub notify_sound: String,
    pub response_policy: ResponsePolicy,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_url: DEFAULT_POLL_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            open_url: DEFAULT_OPEN_URL.to_string(),
            start_on_boot: DEFAULT_START_ON_BOOT,
            vibrate_on_notify: DEFAULT_VIBRATE_ON_NOTIFY,
            notify_sound: String::new(),
            response_policy: ResponsePolicy::default(),
        }
    }
}

impl WatcherSettings {
    /// Poll interval clamped to the one second minimum.
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }

    /// Checks values that may have been edited outside of a [`SettingsDraft`].
    pub fn validate(&self) -> Result<(), SettingsError> {
        checked_url("poll_url", &self.poll_url)?;
        checked_url("open_url", &self.open_url)?;
        if self.poll_interval < MIN_POLL_INTERVAL {
            return Err(SettingsError::IntervalTooShort(self.poll_interval));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} is not a valid URL `{value}`: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("poll interval must be at least one second, got {0:?}")]
    IntervalTooShort(Duration),
}

/// Staged edits on top of the last committed settings.
///
/// Reads through [`SettingsDraft::current`] see staged values first; nothing
/// reaches the committed copy until [`SettingsDraft::commit`].
#[derive(Debug, Clone)]
pub struct SettingsDraft {
    committed: WatcherSettings,
    staged: WatcherSettings,
}

impl SettingsDraft {
    pub fn new(committed: WatcherSettings) -> Self {
        Self {
            staged: committed.clone(),
            committed,
        }
    }

    pub fn current(&self) -> &WatcherSettings {
        &self.staged
    }

    pub fn committed(&self) -> &WatcherSettings {
        &self.committed
    }

    pub fn is_dirty(&self) -> bool {
        self.staged != self.committed
    }

    pub fn set_poll_url(&mut self, value: &str) -> Result<(), SettingsError> {
        self.staged.poll_url = checked_url("poll_url", value)?;
        Ok(())
    }

    pub fn set_open_url(&mut self, value: &str) -> Result<(), SettingsError> {
        self.staged.open_url = checked_url("open_url", value)?;
        Ok(())
    }

    /// Intervals under one second revert to the default instead of failing.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        if interval < MIN_POLL_INTERVAL {
            engine_error!(
                "poll interval {:?} invalid, must be at least one second. reverting to default of {:?}",
                interval,
                DEFAULT_POLL_INTERVAL
            );
            self.staged.poll_interval = DEFAULT_POLL_INTERVAL;
        } else {
            self.staged.poll_interval = interval;
        }
    }

    pub fn set_start_on_boot(&mut self, value: bool) {
        self.staged.start_on_boot = value;
    }

    pub fn set_vibrate_on_notify(&mut self, value: bool) {
        self.staged.vibrate_on_notify = value;
    }

    pub fn set_notify_sound(&mut self, value: impl Into<String>) {
        self.staged.notify_sound = value.into();
    }

    pub fn set_response_policy(&mut self, policy: ResponsePolicy) {
        self.staged.response_policy = policy;
    }

    /// Promotes staged values. Returns the new settings only if anything changed.
    pub fn commit(&mut self) -> Option<WatcherSettings> {
        if !self.is_dirty() {
            return None;
        }
        self.committed = self.staged.clone();
        Some(self.committed.clone())
    }

    /// Drops staged values without committing them.
    pub fn discard(&mut self) {
        self.staged = self.committed.clone();
    }

    /// Reverts both staged and committed values to the defaults.
    pub fn reset(&mut self) -> WatcherSettings {
        self.committed = WatcherSettings::default();
        self.staged = self.committed.clone();
        self.committed.clone()
    }
}

fn checked_url(field: &'static str, value: &str) -> Result<String, SettingsError> {
    Url::parse(value.trim())
        .map(|url| url.to_string())
        .map_err(|err| SettingsError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: err.to_string(),
        })
}
