/// Token the status endpoint returns when the space is open.
pub const OPEN_TOKEN: &str = "open";
/// Token the status endpoint returns when the space is closed.
pub const CLOSED_TOKEN: &str = "closed";

/// How text other than the open token is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponsePolicy {
    /// Anything that is not `open` means closed. Never fails.
    #[default]
    ClosedUnlessOpen,
    /// Only `open` and `closed` are accepted; anything else fails the cycle.
    Strict,
}

impl ResponsePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClosedUnlessOpen => "closed-unless-open",
            Self::Strict => "strict",
        }
    }
}

impl std::str::FromStr for ResponsePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "closed-unless-open" => Ok(Self::ClosedUnlessOpen),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "unknown response policy `{other}`, expected closed-unless-open or strict"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpretError {
    #[error("unrecognized status response `{0}`")]
    UnrecognizedResponse(String),
}

/// True iff the trimmed text equals the open token, ignoring case.
pub fn is_open(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(OPEN_TOKEN)
}

/// Reads fetched status text as open (`true`) or closed (`false`).
pub fn interpret(text: &str, policy: ResponsePolicy) -> Result<bool, InterpretError> {
    if is_open(text) {
        return Ok(true);
    }
    match policy {
        ResponsePolicy::ClosedUnlessOpen => Ok(false),
        ResponsePolicy::Strict if text.trim().eq_ignore_ascii_case(CLOSED_TOKEN) => Ok(false),
        ResponsePolicy::Strict => Err(InterpretError::UnrecognizedResponse(
            text.trim().to_string(),
        )),
    }
}
