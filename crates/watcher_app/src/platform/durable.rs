use std::path::PathBuf;

use chrono::Utc;
use engine_logging::{engine_debug, engine_error, engine_info};
use watcher_engine::{ScheduledWakeup, WakeupScheduler, WakeupTrigger};

use super::persistence::{clear_wakeup, save_wakeup, stop_requested, StateDir, WakeupRecord};

/// The wakeup record and the stop marker that overrides it.
#[derive(Debug, Clone)]
pub(crate) struct RecordFiles {
    record: PathBuf,
    stop: PathBuf,
}

impl RecordFiles {
    pub(crate) fn new(record: PathBuf, stop: PathBuf) -> Self {
        Self { record, stop }
    }

    pub(crate) fn in_dir(dir: &StateDir) -> Self {
        Self::new(dir.wakeup_path(), dir.stop_path())
    }

    /// Records the wakeup unless a stop was requested. Returns whether the
    /// wakeup may still be armed; a failed write does not prevent that.
    fn record(&self, wakeup: &ScheduledWakeup) -> bool {
        if stop_requested(&self.stop) {
            engine_info!(cycle = wakeup.generation; "stop requested, next poll not scheduled");
            return false;
        }

        let record = WakeupRecord::after(Utc::now(), wakeup.delay, wakeup.carry);
        match save_wakeup(&self.record, &record) {
            Ok(()) => engine_debug!(
                cycle = wakeup.generation;
                "next poll recorded for {} carrying {}",
                record.due_utc.to_rfc3339(),
                record.carry
            ),
            Err(err) => engine_error!(cycle = wakeup.generation; "{:#}", err),
        }

        // `stop` writes its marker before removing the record.
        if stop_requested(&self.stop) {
            engine_info!(cycle = wakeup.generation; "stop requested while recording, withdrawn");
            self.forget();
            return false;
        }
        true
    }

    fn forget(&self) {
        if let Err(err) = clear_wakeup(&self.record) {
            engine_error!("{:#}", err);
        }
    }
}

/// Wraps a timer and mirrors every armed wakeup into the wakeup record, so a
/// restarted process can resume where this one stopped.
pub(crate) struct DurableScheduler<S> {
    files: RecordFiles,
    inner: S,
}

impl<S> DurableScheduler<S> {
    pub(crate) fn new(files: RecordFiles, inner: S) -> Self {
        Self { files, inner }
    }
}

impl<S: WakeupScheduler> WakeupScheduler for DurableScheduler<S> {
    fn register_wakeup(&self, wakeup: ScheduledWakeup, trigger: WakeupTrigger) {
        if self.files.record(&wakeup) {
            self.inner.register_wakeup(wakeup, trigger);
        }
    }

    fn cancel(&self) {
        self.files.forget();
        self.inner.cancel();
    }
}

/// Only writes the wakeup record; an external timer re-invokes the binary
/// (`space-watcher tick`) when it is due.
pub(crate) struct RecordOnlyScheduler {
    files: RecordFiles,
}

impl RecordOnlyScheduler {
    pub(crate) fn new(files: RecordFiles) -> Self {
        Self { files }
    }
}

impl WakeupScheduler for RecordOnlyScheduler {
    fn register_wakeup(&self, wakeup: ScheduledWakeup, _trigger: WakeupTrigger) {
        self.files.record(&wakeup);
    }

    fn cancel(&self) {
        self.files.forget();
    }
}
