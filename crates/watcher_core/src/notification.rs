use crate::WatcherSettings;

pub const NOTIFICATION_TITLE: &str = "Space Watcher";
pub const TEXT_OPEN: &str = "The space is open";
pub const TEXT_CLOSED: &str = "The space is closed";
/// Vibration pattern in milliseconds: delay, then alternating on/off.
pub const VIBRATE_PATTERN_MS: [u64; 6] = [0, 100, 100, 100, 100, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationIcon {
    Logo,
    LogoMono,
}

impl NotificationIcon {
    /// Freedesktop icon name used by desktop renderers.
    pub fn icon_name(self) -> &'static str {
        match self {
            Self::Logo => "emblem-default",
            Self::LogoMono => "emblem-unreadable",
        }
    }
}

/// Everything a renderer needs to show a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub text: String,
    pub icon: NotificationIcon,
    pub open_url: String,
    pub vibrate_pattern: Option<Vec<u64>>,
    pub sound: Option<String>,
}

impl NotificationContent {
    pub fn for_state(open: bool, settings: &WatcherSettings) -> Self {
        let (text, icon) = if open {
            (TEXT_OPEN, NotificationIcon::Logo)
        } else {
            (TEXT_CLOSED, NotificationIcon::LogoMono)
        };

        let sound = Some(settings.notify_sound.trim())
            .filter(|sound| !sound.is_empty())
            .map(ToOwned::to_owned);

        Self {
            title: NOTIFICATION_TITLE.to_string(),
            text: text.to_string(),
            icon,
            open_url: settings.open_url.clone(),
            vibrate_pattern: settings
                .vibrate_on_notify
                .then(|| VIBRATE_PATTERN_MS.to_vec()),
            sound,
        }
    }
}
