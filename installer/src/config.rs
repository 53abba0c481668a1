//! Installer configuration.
//!
//! Settings are read from a TOML file located, in order, by the `--config`
//! flag, the `PINSTALL_CONFIG` environment variable, or `config.toml` in the
//! platform configuration directory. When no file is found every setting
//! takes its default. Command-line flags override whatever is loaded here.

use crate::dirs::BaseDirs;
use crate::error::{InstallerError, Result};
use crate::fetch::RetryPolicy;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "PINSTALL_CONFIG";

/// File name looked up in the platform configuration directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    /// Directory under which environments are created, one per package.
    /// Falls back to `<data dir>/envs` when unset.
    pub env_root: Option<Utf8PathBuf>,
    /// Download settings.
    pub fetch: FetchConfig,
    /// Smoke test settings.
    pub smoke_test: SmokeTestConfig,
}

/// Retry and timeout settings for downloads.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on any single retry delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Timeout for each attempt, in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: 250,
            max_delay_ms: 30_000,
            timeout_secs: 30,
        }
    }
}

impl FetchConfig {
    /// The retry policy these settings describe.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    /// Per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Smoke test settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SmokeTestConfig {
    /// Bound on the smoke test's run time, in seconds.
    pub timeout_secs: u64,
}

impl Default for SmokeTestConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl SmokeTestConfig {
    /// Smoke test timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl InstallerConfig {
    /// Load configuration following the lookup order.
    ///
    /// An explicitly named file (flag or environment variable) must exist;
    /// the file in the platform configuration directory is optional.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfig`] if a file that should be
    /// read cannot be read or parsed.
    pub fn load(explicit: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            let path = Utf8PathBuf::from_path_buf(path.into()).map_err(|p| {
                InstallerError::InvalidConfig {
                    path: Utf8PathBuf::from(p.to_string_lossy().into_owned()),
                    reason: format!("{CONFIG_ENV} is not valid UTF-8"),
                }
            })?;
            return Self::from_file(&path);
        }
        let default_path = dirs
            .config_dir()
            .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
            .map(|dir| dir.join(CONFIG_FILE));
        match default_path {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Read and parse the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfig`] if the file cannot be read
    /// or is not valid configuration.
    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| InstallerError::InvalidConfig {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml(&text, path)?;
        debug!("loaded configuration from {path}");
        Ok(config)
    }

    /// Parse configuration text; `path` is used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfig`] on syntax errors and unknown
    /// keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use pinstall::config::InstallerConfig;
    ///
    /// let config = InstallerConfig::from_toml("[fetch]\nmax_retries = 5\n", Utf8Path::new("c.toml"))?;
    /// assert_eq!(config.fetch.max_retries, 5);
    /// assert_eq!(config.smoke_test.timeout_secs, 60);
    /// # Ok::<(), pinstall::error::InstallerError>(())
    /// ```
    pub fn from_toml(text: &str, path: &Utf8Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| InstallerError::InvalidConfig {
            path: path.to_owned(),
            reason: e.message().to_owned(),
        })
    }

    /// Root of the environment for `package` when no prefix is given.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfig`] when `env_root` is unset and
    /// the platform data directory cannot be determined as UTF-8.
    pub fn environment_root(&self, package: &str, dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
        let base = match &self.env_root {
            Some(root) => root.clone(),
            None => dirs
                .data_dir()
                .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
                .map(|dir| dir.join("envs"))
                .ok_or_else(|| InstallerError::InvalidConfig {
                    path: Utf8PathBuf::from(CONFIG_FILE),
                    reason: "no data directory; set env_root or pass --prefix".to_owned(),
                })?,
        };
        Ok(base.join(package))
    }
}
