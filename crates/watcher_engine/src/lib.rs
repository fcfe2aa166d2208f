//! Watcher engine: status fetching, collaborator seams and the poll cycle driver.
mod collaborators;
mod decode;
mod engine;
mod fetch;
mod persist;
mod target;
mod timer;
mod types;

pub use collaborators::{
    ScheduledWakeup, SettingsProvider, SharedSettings, TransitionNotifier, WakeupScheduler,
    WakeupTrigger,
};
pub use engine::{Collaborators, EngineError, EngineHandle};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use persist::{ensure_state_dir, read_optional, remove_if_exists, write_atomically, PersistError};
pub use target::{PollTarget, TargetError, STATUS_LINES};
pub use timer::InProcessTimer;
pub use types::{EngineEvent, FailureKind, FetchError};
