//! Desktop rendering of state changes through `notify-send`, degrading to the
//! terminal when no notification daemon is reachable.

use std::process::Command;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info, engine_warn};
use watcher_core::{NotificationContent, NOTIFICATION_TITLE};
use watcher_engine::{SettingsProvider, TransitionNotifier};

const NOTIFY_SEND: &str = "notify-send";
const APP_NAME: &str = "space-watcher";
/// Lets a newer notification replace the previous one instead of stacking.
const REPLACE_HINT: &str = "string:x-canonical-private-synchronous:space-watcher";
const STOPPED_TEXT: &str = "Watching stopped";

pub(crate) struct DesktopNotifier {
    settings: Arc<dyn SettingsProvider>,
}

impl DesktopNotifier {
    pub(crate) fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self { settings }
    }

    fn send(&self, args: &[String], fallback: &str) {
        let shown = Command::new(NOTIFY_SEND)
            .args(args)
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if !shown {
            engine_debug!("{} unavailable, printing instead", NOTIFY_SEND);
            println!("{fallback}");
        }
    }
}

impl TransitionNotifier for DesktopNotifier {
    fn notify(&self, open: bool) {
        let content = NotificationContent::for_state(open, &self.settings.current());
        if let Some(pattern) = &content.vibrate_pattern {
            engine_debug!("no vibration on this platform, skipping pattern {:?}", pattern);
        }
        engine_info!("{}", content.text);
        self.send(
            &notify_args(&content),
            &format!("{}: {} ({})", content.title, content.text, content.open_url),
        );
    }

    fn clear(&self) {
        self.send(
            &clear_args(),
            &format!("{}: {}", NOTIFICATION_TITLE, STOPPED_TEXT),
        );
    }

    fn notice(&self, message: &str) {
        engine_warn!("{}", message);
        eprintln!("{}: {}", NOTIFICATION_TITLE, message);
    }
}

fn notify_args(content: &NotificationContent) -> Vec<String> {
    let mut args = vec![
        "--app-name".to_string(),
        APP_NAME.to_string(),
        "--icon".to_string(),
        content.icon.icon_name().to_string(),
        "--hint".to_string(),
        REPLACE_HINT.to_string(),
    ];
    if let Some(sound) = &content.sound {
        args.push("--hint".to_string());
        args.push(format!("string:sound-file:{sound}"));
    }
    args.push(content.title.clone());
    args.push(format!("{}\n{}", content.text, content.open_url));
    args
}

/// `notify-send` cannot close a notification, so it is replaced by a
/// short-lived one.
fn clear_args() -> Vec<String> {
    vec![
        "--app-name".to_string(),
        APP_NAME.to_string(),
        "--expire-time".to_string(),
        "1".to_string(),
        "--hint".to_string(),
        REPLACE_HINT.to_string(),
        NOTIFICATION_TITLE.to_string(),
        STOPPED_TEXT.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use watcher_core::WatcherSettings;

    use super::*;

    #[test]
    fn open_notification_carries_icon_and_link() {
        let content = NotificationContent::for_state(true, &WatcherSettings::default());
        let args = notify_args(&content);

        assert_eq!(
            args,
            vec![
                "--app-name",
                "space-watcher",
                "--icon",
                "emblem-default",
                "--hint",
                REPLACE_HINT,
                "Space Watcher",
                "The space is open\nhttp://techinc.nl/",
            ]
        );
    }

    #[test]
    fn sound_becomes_a_hint() {
        let settings = WatcherSettings {
            notify_sound: "/usr/share/sounds/bell.oga".to_string(),
            ..WatcherSettings::default()
        };
        let args = notify_args(&NotificationContent::for_state(false, &settings));

        assert!(args.contains(&"emblem-unreadable".to_string()));
        assert!(args.contains(&"string:sound-file:/usr/share/sounds/bell.oga".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("The space is closed\nhttp://techinc.nl/")
        );
    }

    #[test]
    fn clearing_replaces_with_expiring_notice() {
        let args = clear_args();
        assert_eq!(args[args.len() - 1], STOPPED_TEXT);
        assert!(args.windows(2).any(|pair| pair == ["--expire-time", "1"]));
    }
}
