use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use engine_logging::{engine_info, engine_warn};
use watcher_core::WatcherSettings;
use watcher_engine::SettingsProvider;

use super::persistence::load_settings;

/// Settings backed by the RON file in the state directory.
///
/// The file is re-read whenever its modification time or length changes, so edits made
/// with `space-watcher settings set` reach a running watcher on its next read.
/// A file that fails to parse keeps the last good settings in effect.
pub(crate) struct FileSettings {
    path: PathBuf,
    cache: Mutex<Cached>,
}

struct Cached {
    stamp: Option<Stamp>,
    settings: WatcherSettings,
}

/// Two writes within one timestamp tick usually differ in length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: SystemTime,
    len: u64,
}

impl FileSettings {
    pub(crate) fn new(path: PathBuf, initial: WatcherSettings) -> Self {
        let stamp = stamp(&path);
        Self {
            path,
            cache: Mutex::new(Cached {
                stamp,
                settings: initial,
            }),
        }
    }
}

impl SettingsProvider for FileSettings {
    fn current(&self) -> WatcherSettings {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let stamp = stamp(&self.path);
        if stamp == cache.stamp {
            return cache.settings.clone();
        }
        cache.stamp = stamp;

        match load_settings(&self.path) {
            Ok(Some(settings)) => {
                engine_info!("Settings reloaded from {:?}", self.path);
                cache.settings = settings;
            }
            Ok(None) => {
                engine_info!("Settings file {:?} removed; using defaults", self.path);
                cache.settings = WatcherSettings::default();
            }
            Err(err) => {
                engine_warn!("Keeping previous settings: {:#}", err);
            }
        }
        cache.settings.clone()
    }
}

fn stamp(path: &Path) -> Option<Stamp> {
    let meta = fs::metadata(path).ok()?;
    Some(Stamp {
        modified: meta.modified().ok()?,
        len: meta.len(),
    })
}
