use std::fmt;
use std::num::NonZeroUsize;

use url::Url;

/// Number of leading lines that carry the space state.
pub const STATUS_LINES: NonZeroUsize = NonZeroUsize::MIN;

/// Where to fetch from and how much of the response to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    url: Url,
    line_count: NonZeroUsize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("malformed poll url `{url}`: {reason}")]
    Malformed { url: String, reason: String },
    #[error("unsupported scheme `{scheme}` in poll url `{url}`, expected http or https")]
    UnsupportedScheme { url: String, scheme: String },
    #[error("poll url `{0}` has no host")]
    MissingHost(String),
}

impl PollTarget {
    pub fn new(url: &str, line_count: NonZeroUsize) -> Result<Self, TargetError> {
        let parsed = Url::parse(url.trim()).map_err(|err| TargetError::Malformed {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TargetError::UnsupportedScheme {
                url: url.to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }
        if parsed.host().is_none() {
            return Err(TargetError::MissingHost(url.to_string()));
        }
        Ok(Self {
            url: parsed,
            line_count,
        })
    }

    /// Target reading only the status line of `url`.
    pub fn status(url: &str) -> Result<Self, TargetError> {
        Self::new(url, STATUS_LINES)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn line_count(&self) -> NonZeroUsize {
        self.line_count
    }
}

impl fmt::Display for PollTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} line(s))", self.url, self.line_count)
    }
}
