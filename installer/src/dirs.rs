//! Platform directory resolution.
//!
//! Wraps `directories-next` behind a trait so configuration lookup and the
//! default environment root can be tested without touching the real home
//! directory.

use std::path::PathBuf;

/// Access to the per-user directories pinstall reads from and writes to.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Directory holding `config.toml`.
    fn config_dir(&self) -> Option<PathBuf>;

    /// Directory under which environments are created by default.
    fn data_dir(&self) -> Option<PathBuf>;
}

/// Directories resolved from the host platform's conventions.
///
/// # Examples
///
/// ```no_run
/// use pinstall::dirs::{BaseDirs, SystemBaseDirs};
///
/// let dirs = SystemBaseDirs;
/// if let Some(config_dir) = dirs.config_dir() {
///     println!("config lives in {}", config_dir.display());
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl SystemBaseDirs {
    fn project() -> Option<directories_next::ProjectDirs> {
        directories_next::ProjectDirs::from("", "", "pinstall")
    }
}

impl BaseDirs for SystemBaseDirs {
    fn config_dir(&self) -> Option<PathBuf> {
        Self::project().map(|p| p.config_dir().to_path_buf())
    }

    fn data_dir(&self) -> Option<PathBuf> {
        Self::project().map(|p| p.data_dir().to_path_buf())
    }
}
