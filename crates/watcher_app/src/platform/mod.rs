mod app;
mod durable;
mod notifier;
mod persistence;
mod settings_file;

pub(crate) use app::{App, SettingKey};
pub(crate) use persistence::StateDir;
