//! Watcher core: pure poll scheduling state machine, status interpretation and settings.
mod effect;
mod interpret;
mod msg;
mod notification;
mod observed;
mod settings;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, WakeupDelay};
pub use interpret::{interpret, is_open, InterpretError, ResponsePolicy, CLOSED_TOKEN, OPEN_TOKEN};
pub use msg::Msg;
pub use notification::{NotificationContent, NotificationIcon, NOTIFICATION_TITLE, VIBRATE_PATTERN_MS};
pub use observed::{ObservedState, ParseStateError};
pub use settings::{
    SettingsDraft, SettingsError, WatcherSettings, DEFAULT_OPEN_URL, DEFAULT_POLL_INTERVAL,
    DEFAULT_POLL_URL, MIN_POLL_INTERVAL,
};
pub use state::{Phase, WatchState};
pub use update::update;
pub use view_model::WatchStatusView;
