use std::fmt;
use std::str::FromStr;

/// Last known state of the watched space.
///
/// `Unknown` is the state before the first successful poll of an engine
/// instance; it is never produced by a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObservedState {
    #[default]
    Unknown,
    Open,
    Closed,
}

impl ObservedState {
    pub fn from_open(open: bool) -> Self {
        if open {
            Self::Open
        } else {
            Self::Closed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ObservedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown state `{0}`, expected open, closed or unknown")]
pub struct ParseStateError(pub String);

impl FromStr for ObservedState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(ParseStateError(other.to_string())),
        }
    }
}
