//! Artefact retrieval.
//!
//! Provides a trait-based abstraction for fetching artefact bytes so the
//! orchestrator can be exercised without network access, an HTTP
//! implementation backed by `ureq`, and a retry policy that separates
//! transient failures from permanent ones.

mod http;
mod retry;

pub use http::{DEFAULT_FETCH_TIMEOUT, HttpFetcher};
pub use retry::{RetryDecision, RetryPolicy, fetch_with_retry};

/// Bytes retrieved for a URL.
///
/// Lives only between the fetch and verify steps; it is dropped once the
/// artefact is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    bytes: Vec<u8>,
    source_url: String,
}

impl FetchResult {
    /// Wrap fetched bytes with the URL they came from.
    #[must_use]
    pub fn new(bytes: Vec<u8>, source_url: impl Into<String>) -> Self {
        Self {
            bytes,
            source_url: source_url.into(),
        }
    }

    /// The fetched content.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The URL the content was fetched from.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

/// Trait for fetching artefact bytes, enabling test doubles.
///
/// # Examples
///
/// ```no_run
/// use pinstall::fetch::{Fetcher, HttpFetcher};
///
/// let fetcher = HttpFetcher::default();
/// let result = fetcher.fetch("https://example.com/archive.tar.gz")?;
/// assert!(!result.bytes().is_empty());
/// # Ok::<(), pinstall::fetch::FetchError>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Fetcher {
    /// Fetch the full content of `url` in a single attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing why the attempt failed; callers
    /// use [`FetchError::is_transient`] to decide whether to retry.
    fn fetch(&self, url: &str) -> Result<FetchResult, FetchError>;
}

/// Errors arising from a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request did not complete within the fetch timeout.
    #[error("timed out fetching {url}")]
    Timeout {
        /// The URL that was requested.
        url: String,
    },

    /// The connection could not be established or was reset.
    #[error("connection failed for {url}: {reason}")]
    Connection {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server answered with an error status other than not-found.
    #[error("HTTP status {status} for {url}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The artefact does not exist.
    #[error("not found: {url}")]
    NotFound {
        /// The URL that was requested.
        url: String,
    },

    /// The URL could not be used to make a request.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Any other failure.
    #[error("fetch failed for {url}: {reason}")]
    Other {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },
}

impl FetchError {
    /// Return true when retrying the same request may succeed.
    ///
    /// Timeouts, connection failures, request-timeout (408), throttling (429)
    /// and server errors (5xx) are transient; everything else is permanent.
    ///
    /// # Examples
    ///
    /// ```
    /// use pinstall::fetch::FetchError;
    ///
    /// let url = "https://example.com/a".to_owned();
    /// assert!(FetchError::Status { url: url.clone(), status: 503 }.is_transient());
    /// assert!(!FetchError::NotFound { url }.is_transient());
    /// ```
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connection { .. } => true,
            Self::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
            Self::NotFound { .. } | Self::InvalidUrl { .. } | Self::Other { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn url() -> String {
        "https://example.test/a.tar.gz".to_owned()
    }

    #[rstest]
    #[case::timeout(FetchError::Timeout { url: url() }, true)]
    #[case::reset(FetchError::Connection { url: url(), reason: "reset".to_owned() }, true)]
    #[case::throttled(FetchError::Status { url: url(), status: 429 }, true)]
    #[case::bad_gateway(FetchError::Status { url: url(), status: 502 }, true)]
    #[case::forbidden(FetchError::Status { url: url(), status: 403 }, false)]
    #[case::not_found(FetchError::NotFound { url: url() }, false)]
    #[case::invalid(FetchError::InvalidUrl { url: url(), reason: "bad".to_owned() }, false)]
    fn classifies_transient_failures(#[case] err: FetchError, #[case] transient: bool) {
        assert_eq!(err.is_transient(), transient);
    }

    #[test]
    fn fetch_result_exposes_bytes_and_url() {
        let result = FetchResult::new(b"data".to_vec(), url());
        assert_eq!(result.bytes(), b"data");
        assert_eq!(result.source_url(), url());
    }
}
