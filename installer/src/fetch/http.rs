//! HTTP(S) and local-file fetching.

use super::{FetchError, FetchResult, Fetcher};
use log::debug;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Per-attempt timeout used when none is configured.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const FILE_SCHEME: &str = "file://";

/// Fetcher using `ureq` for `http(s)://` URLs and the filesystem for
/// `file://` URLs.
///
/// A `file://` URL must name a local absolute path: its authority is empty
/// or `localhost`, and percent-escapes in the path are decoded. Any other
/// host is rejected with [`FetchError::InvalidUrl`].
///
/// Each call makes exactly one attempt; wrap it with
/// [`fetch_with_retry`](super::fetch_with_retry) for retries.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        if url.starts_with(FILE_SCHEME) {
            return read_local(url);
        }
        debug!("GET {url}");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut body = response.into_body();
        let mut bytes = Vec::new();
        body.as_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| map_io_error(url, &e))?;
        Ok(FetchResult::new(bytes, url))
    }
}

/// Read a `file://` URL from disk.
fn read_local(url: &str) -> Result<FetchResult, FetchError> {
    let path = local_path(url)?;
    debug!("reading local artefact {}", path.display());
    match std::fs::read(&path) {
        Ok(bytes) => Ok(FetchResult::new(bytes, url)),
        Err(e) if e.kind() == IoErrorKind::NotFound => Err(FetchError::NotFound {
            url: url.to_owned(),
        }),
        Err(e) => Err(FetchError::Other {
            url: url.to_owned(),
            reason: e.to_string(),
        }),
    }
}

/// Resolve a `file://` URL to the path it names on this host.
fn local_path(url: &str) -> Result<PathBuf, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: url.to_owned(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    parsed.to_file_path().map_err(|()| {
        invalid(format!(
            "file URL must name a local path, not host {}",
            parsed.host_str().unwrap_or_default()
        ))
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404 | 410) => FetchError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::StatusCode(status) => FetchError::Status {
            url: url.to_owned(),
            status: *status,
        },
        ureq::Error::Timeout(_) => FetchError::Timeout {
            url: url.to_owned(),
        },
        ureq::Error::Io(io) => map_io_error(url, io),
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => FetchError::Connection {
            url: url.to_owned(),
            reason: err.to_string(),
        },
        ureq::Error::BadUri(reason) => FetchError::InvalidUrl {
            url: url.to_owned(),
            reason: reason.clone(),
        },
        other => FetchError::Other {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Map an I/O error raised while talking to the server.
fn map_io_error(url: &str, err: &std::io::Error) -> FetchError {
    match err.kind() {
        IoErrorKind::TimedOut | IoErrorKind::WouldBlock => FetchError::Timeout {
            url: url.to_owned(),
        },
        IoErrorKind::ConnectionReset
        | IoErrorKind::ConnectionAborted
        | IoErrorKind::ConnectionRefused
        | IoErrorKind::BrokenPipe
        | IoErrorKind::UnexpectedEof => FetchError::Connection {
            url: url.to_owned(),
            reason: err.to_string(),
        },
        _ => FetchError::Other {
            url: url.to_owned(),
            reason: err.to_string(),
        },
    }
}
