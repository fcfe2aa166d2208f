use std::fmt;
use std::time::Duration;

use watcher_core::{ObservedState, WatchStatusView};

/// Observable things the engine did, in the order it did them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    StatusChanged(WatchStatusView),
    CycleStarted {
        generation: u64,
        url: String,
    },
    Notified {
        open: bool,
    },
    NotificationCleared,
    CycleFailed {
        generation: u64,
        reason: String,
    },
    WakeupArmed {
        generation: u64,
        delay: Duration,
        carry: ObservedState,
    },
    WakeupCancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64 },
    PrematureEnd { expected: usize, received: usize },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes } => {
                write!(f, "status lines exceed {max_bytes} bytes")
            }
            FailureKind::PrematureEnd { expected, received } => {
                write!(f, "response ended after {received} of {expected} line(s)")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
