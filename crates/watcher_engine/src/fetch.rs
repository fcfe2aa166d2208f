use std::time::Duration;

use engine_logging::{engine_debug, engine_trace};
use futures_util::StreamExt;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};

use crate::decode::LineDecoder;
use crate::{FailureKind, FetchError, PollTarget};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// `None` leaves connection setup to the transport's own limits.
    pub connect_timeout: Option<Duration>,
    /// `None` lets an unresponsive server stall the cycle.
    pub request_timeout: Option<Duration>,
    pub redirect_limit: usize,
    /// Upper bound on bytes read while collecting the requested lines.
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            request_timeout: None,
            redirect_limit: 5,
            max_bytes: 64 * 1024,
        }
    }
}

/// Reads the leading lines of a poll target. One attempt per call, no retry.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &PollTarget) -> Result<String, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    /// A fresh client per fetch with pooling disabled, so the connection is
    /// closed as soon as the response is dropped.
    fn build_client(&self) -> Result<reqwest::Client, FetchError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(self.settings.redirect_limit))
            .pool_max_idle_per_host(0);
        if let Some(timeout) = self.settings.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = self.settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, target: &PollTarget) -> Result<String, FetchError> {
        let client = self.build_client()?;

        engine_trace!("opening connection to {}", target.url());
        let response = client
            .get(target.url().clone())
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let mut lines = LineCollector::new(
            target.line_count().get(),
            self.settings.max_bytes,
            LineDecoder::for_content_type(content_type.as_deref()),
        );

        engine_trace!("connection open, reading {} line(s)", target.line_count());
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if lines.feed(&chunk)? {
                break;
            }
        }

        let text = lines.finish()?;
        engine_debug!("read status text {:?} from {}", text, target.url());
        Ok(text)
    }
}

/// Splits a byte stream into lines until `wanted` lines are complete.
pub(crate) struct LineCollector {
    wanted: usize,
    max_bytes: u64,
    seen_bytes: u64,
    partial: Vec<u8>,
    lines: Vec<String>,
    decoder: LineDecoder,
}

impl LineCollector {
    pub(crate) fn new(wanted: usize, max_bytes: u64, decoder: LineDecoder) -> Self {
        Self {
            wanted,
            max_bytes,
            seen_bytes: 0,
            partial: Vec::new(),
            lines: Vec::with_capacity(wanted),
            decoder,
        }
    }

    /// Consumes a chunk. Returns true once enough lines have been read.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Result<bool, FetchError> {
        let mut rest = chunk;
        while self.lines.len() < self.wanted {
            let Some(newline) = rest.iter().position(|byte| *byte == b'\n') else {
                self.partial.extend_from_slice(rest);
                self.account(rest.len())?;
                return Ok(false);
            };
            let (line, tail) = rest.split_at(newline);
            self.partial.extend_from_slice(line);
            self.account(newline + 1)?;
            self.complete_line();
            rest = &tail[1..];
        }
        Ok(true)
    }

    /// Ends the stream. A trailing line without `\n` still counts.
    pub(crate) fn finish(mut self) -> Result<String, FetchError> {
        if self.lines.len() < self.wanted && !self.partial.is_empty() {
            self.complete_line();
        }
        if self.lines.len() < self.wanted {
            return Err(FetchError::new(
                FailureKind::PrematureEnd {
                    expected: self.wanted,
                    received: self.lines.len(),
                },
                "stream ended early",
            ));
        }
        Ok(self.lines.concat())
    }

    fn account(&mut self, len: usize) -> Result<(), FetchError> {
        self.seen_bytes += len as u64;
        if self.seen_bytes > self.max_bytes {
            return Err(FetchError::new(
                FailureKind::TooLarge {
                    max_bytes: self.max_bytes,
                },
                "response too large",
            ));
        }
        Ok(())
    }

    fn complete_line(&mut self) {
        let mut raw = std::mem::take(&mut self.partial);
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        self.lines.push(self.decoder.decode(&raw));
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(wanted: usize) -> LineCollector {
        LineCollector::new(wanted, 1024, LineDecoder::for_content_type(None))
    }

    #[test]
    fn stops_after_requested_lines() {
        let mut lines = collector(1);
        assert!(lines.feed(b"open\nignored\n").unwrap());
        assert_eq!(lines.finish().unwrap(), "open");
    }

    #[test]
    fn lines_split_across_chunks_are_joined_without_delimiter() {
        let mut lines = collector(2);
        assert!(!lines.feed(b"op").unwrap());
        assert!(!lines.feed(b"en\r\nsin").unwrap());
        assert!(lines.feed(b"ce 2011\nrest").unwrap());
        assert_eq!(lines.finish().unwrap(), "opensince 2011");
    }

    #[test]
    fn unterminated_last_line_counts() {
        let mut lines = collector(1);
        assert!(!lines.feed(b"closed").unwrap());
        assert_eq!(lines.finish().unwrap(), "closed");
    }

    #[test]
    fn blank_line_is_empty_text() {
        let mut lines = collector(1);
        assert!(lines.feed(b"\n").unwrap());
        assert_eq!(lines.finish().unwrap(), "");
    }

    #[test]
    fn missing_lines_are_premature_end() {
        let lines = collector(1);
        assert_eq!(
            lines.finish().unwrap_err().kind,
            FailureKind::PrematureEnd {
                expected: 1,
                received: 0
            }
        );

        let mut lines = collector(3);
        lines.feed(b"open\n").unwrap();
        assert_eq!(
            lines.finish().unwrap_err().kind,
            FailureKind::PrematureEnd {
                expected: 3,
                received: 1
            }
        );
    }

    #[test]
    fn endless_line_is_too_large() {
        let mut lines = LineCollector::new(1, 8, LineDecoder::for_content_type(None));
        assert!(!lines.feed(b"0123").unwrap());
        let err = lines.feed(b"456789").unwrap_err();
        assert_eq!(err.kind, FailureKind::TooLarge { max_bytes: 8 });
    }
}
