use std::sync::Once;
use std::time::Duration;

use watcher_core::{
    NotificationContent, NotificationIcon, ResponsePolicy, SettingsDraft, SettingsError,
    WatcherSettings, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_URL, VIBRATE_PATTERN_MS,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

#[test]
fn defaults_match_the_space_endpoint() {
    let settings = WatcherSettings::default();
    assert_eq!(settings.poll_url, DEFAULT_POLL_URL);
    assert_eq!(settings.poll_interval, Duration::from_secs(180));
    assert!(settings.start_on_boot);
    assert!(!settings.vibrate_on_notify);
    assert!(settings.notify_sound.is_empty());
    assert_eq!(settings.response_policy, ResponsePolicy::ClosedUnlessOpen);
    assert_eq!(settings.validate(), Ok(()));
}

#[test]
fn staged_values_are_visible_but_not_committed() {
    init_logging();
    let mut draft = SettingsDraft::new(WatcherSettings::default());
    assert!(!draft.is_dirty());

    draft.set_poll_interval(Duration::from_secs(60));
    draft.set_vibrate_on_notify(true);

    assert!(draft.is_dirty());
    assert_eq!(draft.current().poll_interval, Duration::from_secs(60));
    assert_eq!(draft.committed().poll_interval, DEFAULT_POLL_INTERVAL);

    let committed = draft.commit().expect("dirty draft commits");
    assert_eq!(committed.poll_interval, Duration::from_secs(60));
    assert!(committed.vibrate_on_notify);
    assert!(!draft.is_dirty());
    assert_eq!(draft.commit(), None);
}

#[test]
fn setting_the_same_value_is_not_dirty() {
    let mut draft = SettingsDraft::new(WatcherSettings::default());
    draft.set_poll_interval(DEFAULT_POLL_INTERVAL);
    draft.set_notify_sound("");
    assert!(!draft.is_dirty());
}

#[test]
fn short_interval_reverts_to_default() {
    init_logging();
    let mut draft = SettingsDraft::new(WatcherSettings {
        poll_interval: Duration::from_secs(30),
        ..WatcherSettings::default()
    });
    draft.set_poll_interval(Duration::from_millis(200));
    assert_eq!(draft.current().poll_interval, DEFAULT_POLL_INTERVAL);
}

#[test]
fn invalid_url_is_rejected_and_not_staged() {
    let mut draft = SettingsDraft::new(WatcherSettings::default());
    let err = draft.set_poll_url("not a url").unwrap_err();
    assert!(matches!(err, SettingsError::InvalidUrl { field: "poll_url", .. }));
    assert_eq!(draft.current().poll_url, DEFAULT_POLL_URL);
    assert!(!draft.is_dirty());
}

#[test]
fn urls_are_normalized() {
    let mut draft = SettingsDraft::new(WatcherSettings::default());
    draft.set_open_url("  https://example.org ").unwrap();
    assert_eq!(draft.current().open_url, "https://example.org/");
}

#[test]
fn discard_and_reset() {
    let mut draft = SettingsDraft::new(WatcherSettings {
        start_on_boot: false,
        ..WatcherSettings::default()
    });
    draft.set_notify_sound("/usr/share/sounds/bell.oga");
    draft.discard();
    assert!(!draft.is_dirty());
    assert!(draft.current().notify_sound.is_empty());

    let defaults = draft.reset();
    assert_eq!(defaults, WatcherSettings::default());
    assert!(draft.committed().start_on_boot);
}

#[test]
fn validate_flags_hand_edited_values() {
    let settings = WatcherSettings {
        poll_interval: Duration::ZERO,
        ..WatcherSettings::default()
    };
    assert_eq!(
        settings.validate(),
        Err(SettingsError::IntervalTooShort(Duration::ZERO))
    );
    assert_eq!(settings.effective_poll_interval(), Duration::from_secs(1));
}

#[test]
fn notification_reflects_preferences() {
    let quiet = WatcherSettings::default();
    let open = NotificationContent::for_state(true, &quiet);
    assert_eq!(open.icon, NotificationIcon::Logo);
    assert_eq!(open.open_url, quiet.open_url);
    assert_eq!(open.vibrate_pattern, None);
    assert_eq!(open.sound, None);

    let loud = WatcherSettings {
        vibrate_on_notify: true,
        notify_sound: " bell.oga ".to_string(),
        ..WatcherSettings::default()
    };
    let closed = NotificationContent::for_state(false, &loud);
    assert_eq!(closed.icon, NotificationIcon::LogoMono);
    assert_ne!(closed.text, open.text);
    assert_eq!(closed.vibrate_pattern, Some(VIBRATE_PATTERN_MS.to_vec()));
    assert_eq!(closed.sound.as_deref(), Some("bell.oga"));
}
