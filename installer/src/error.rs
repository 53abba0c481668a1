//! Error types for the pinstall installer.
//!
//! [`InstallerError`] is the single error surfaced to the orchestrator and the
//! CLI. Every variant maps onto an [`ErrorKind`], the stable classification
//! recorded in install outcomes and receipts.

use crate::fetch::FetchError;
use crate::manifest::ManifestError;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Stable classification of an install or smoke-test failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The manifest could not be read or failed validation.
    MalformedManifest,
    /// A download failed after exhausting its retry budget.
    FetchFailed,
    /// Fetched bytes did not hash to the declared digest.
    DigestMismatch,
    /// An archive entry would have been written outside its destination.
    UnsafeArchiveEntry,
    /// Writing into the environment failed.
    InstallWriteFailed,
    /// The smoke test exited with an unexpected status.
    SmokeTestFailed,
    /// The smoke test did not finish within its timeout.
    SmokeTestTimeout,
    /// The run was cancelled before it completed.
    Cancelled,
    /// The environment is missing or was left unusable by a failed run.
    EnvironmentNotReady,
    /// The configuration file could not be loaded.
    InvalidConfig,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedManifest => "MalformedManifest",
            Self::FetchFailed => "FetchFailed",
            Self::DigestMismatch => "DigestMismatch",
            Self::UnsafeArchiveEntry => "UnsafeArchiveEntry",
            Self::InstallWriteFailed => "InstallWriteFailed",
            Self::SmokeTestFailed => "SmokeTestFailed",
            Self::SmokeTestTimeout => "SmokeTestTimeout",
            Self::Cancelled => "Cancelled",
            Self::EnvironmentNotReady => "EnvironmentNotReady",
            Self::InvalidConfig => "InvalidConfig",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while installing or testing a package.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The manifest failed validation.
    #[error("malformed manifest: {0}")]
    MalformedManifest(#[from] ManifestError),

    /// The manifest file could not be read.
    #[error("could not read manifest {path}: {source}")]
    ManifestUnreadable {
        /// Path of the manifest that was requested.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A download failed; transient failures were retried first.
    #[error("fetch failed for {url} after {attempts} attempt(s): {source}")]
    FetchFailed {
        /// The URL that could not be fetched.
        url: String,
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The last error observed.
        #[source]
        source: FetchError,
    },

    /// Fetched content hashed to a different digest than declared.
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// The declared digest, hex encoded.
        expected: String,
        /// The computed digest, hex encoded.
        actual: String,
    },

    /// An archive entry resolves outside its destination directory.
    #[error("unsafe archive entry rejected: {entry}")]
    UnsafeArchiveEntry {
        /// The offending entry path (and link target, if any).
        entry: String,
    },

    /// A filesystem operation inside the environment failed.
    #[error("install write failed at {path}: {reason}")]
    InstallWriteFailed {
        /// The path that was being written.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// The smoke test exited with an unexpected status.
    #[error("smoke test `{command}` failed: {status}{}", format_output(.output))]
    SmokeTestFailed {
        /// The command that was run.
        command: String,
        /// Description of the observed exit status.
        status: String,
        /// Captured stdout and stderr of the child.
        output: String,
    },

    /// The smoke test exceeded its timeout and was killed.
    #[error("smoke test `{command}` timed out after {}s", .timeout.as_secs())]
    SmokeTestTimeout {
        /// The command that was run.
        command: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The run was cancelled.
    #[error("install cancelled")]
    Cancelled,

    /// The environment cannot be used for the requested operation.
    #[error("environment at {root} is not ready: {reason}")]
    EnvironmentNotReady {
        /// Root of the environment.
        root: Utf8PathBuf,
        /// Why the environment cannot be used.
        reason: String,
    },

    /// The configuration file could not be loaded.
    #[error("invalid configuration at {path}: {reason}")]
    InvalidConfig {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Description of the parse or read failure.
        reason: String,
    },
}

impl InstallerError {
    /// Return the stable classification for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedManifest(_) | Self::ManifestUnreadable { .. } => {
                ErrorKind::MalformedManifest
            }
            Self::FetchFailed { .. } => ErrorKind::FetchFailed,
            Self::DigestMismatch { .. } => ErrorKind::DigestMismatch,
            Self::UnsafeArchiveEntry { .. } => ErrorKind::UnsafeArchiveEntry,
            Self::InstallWriteFailed { .. } => ErrorKind::InstallWriteFailed,
            Self::SmokeTestFailed { .. } => ErrorKind::SmokeTestFailed,
            Self::SmokeTestTimeout { .. } => ErrorKind::SmokeTestTimeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::EnvironmentNotReady { .. } => ErrorKind::EnvironmentNotReady,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
        }
    }

    /// Build an [`InstallerError::InstallWriteFailed`] from an I/O error.
    pub(crate) fn write_failed(path: impl Into<Utf8PathBuf>, err: &std::io::Error) -> Self {
        Self::InstallWriteFailed {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

fn format_output(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
