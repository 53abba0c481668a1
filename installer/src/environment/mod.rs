//! Isolated installation environments.
//!
//! An environment is a directory tree owned by one install run:
//!
//! ```text
//! <root>/.pinstall/receipt.json
//! <root>/libexec/<name>/...
//! <root>/bin/<binary>
//! ```
//!
//! Artefacts are unpacked into a staging directory under `.pinstall/` and
//! renamed into `libexec/` only once extraction has succeeded, so a rejected
//! archive never leaves files behind.

mod extraction;
mod receipt;

pub use extraction::{ArchiveFormat, ExtractionError, unpack};
pub use receipt::{InstallReceipt, InstalledArtefact, METADATA_DIR, RECEIPT_FILE, ReceiptStatus};

use crate::error::{InstallerError, Result};
use crate::fetch::FetchResult;
use crate::manifest::url_file_name;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;

/// Directory holding one subdirectory per installed artefact.
pub const LIBEXEC_DIR: &str = "libexec";

/// Directory holding exposed binaries.
pub const BIN_DIR: &str = "bin";

/// A directory-scoped environment owning every installed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallEnvironment {
    root: Utf8PathBuf,
    isolated: bool,
}

impl InstallEnvironment {
    /// Open an existing environment at `root`.
    ///
    /// Opening does not check the receipt; callers that need a usable
    /// environment consult [`InstallEnvironment::receipt`].
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::EnvironmentNotReady`] if `root` is not an
    /// existing directory.
    pub fn open(root: &Utf8Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(InstallerError::EnvironmentNotReady {
                root: root.to_owned(),
                reason: "no environment exists at this path".to_owned(),
            });
        }
        let root = root
            .canonicalize_utf8()
            .map_err(|e| InstallerError::EnvironmentNotReady {
                root: root.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            root,
            isolated: true,
        })
    }

    /// The environment root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Return true when nothing outside the root is shared with the host.
    #[must_use]
    pub const fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// Directory of exposed binaries.
    #[must_use]
    pub fn bin_dir(&self) -> Utf8PathBuf {
        self.root.join(BIN_DIR)
    }

    /// Directory holding installer metadata and staging areas.
    #[must_use]
    pub fn metadata_dir(&self) -> Utf8PathBuf {
        self.root.join(METADATA_DIR)
    }

    /// Location of the artefact named `name`, relative to the root.
    #[must_use]
    pub fn artefact_location(name: &str) -> Utf8PathBuf {
        Utf8Path::new(LIBEXEC_DIR).join(name)
    }

    /// Absolute directory of the artefact named `name`.
    #[must_use]
    pub fn artefact_dir(&self, name: &str) -> Utf8PathBuf {
        self.root.join(Self::artefact_location(name))
    }

    /// Read the environment's install receipt.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::EnvironmentNotReady`] if the receipt is
    /// missing or unreadable.
    pub fn receipt(&self) -> Result<InstallReceipt> {
        InstallReceipt::read(&self.root)
    }
}

/// Creates fresh environments.
#[derive(Debug, Clone)]
pub struct EnvironmentBuilder {
    root: Utf8PathBuf,
    replace_existing: bool,
}

impl EnvironmentBuilder {
    /// Prepare to create an environment at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            replace_existing: false,
        }
    }

    /// Allow an existing non-empty root to be deleted and recreated.
    #[must_use]
    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    /// The root the environment will be created at.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Create the environment directory layout.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InstallWriteFailed`] if the root exists and
    /// is not an empty directory (unless replacement was requested), or if
    /// any directory cannot be created.
    pub fn create(&self) -> Result<InstallEnvironment> {
        let root = &self.root;
        if root.exists() {
            self.clear_existing()?;
        }
        for dir in [METADATA_DIR, LIBEXEC_DIR, BIN_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| InstallerError::write_failed(&path, &e))?;
        }
        let root = root
            .canonicalize_utf8()
            .map_err(|e| InstallerError::write_failed(root, &e))?;
        debug!("created environment at {root}");
        Ok(InstallEnvironment {
            root,
            isolated: true,
        })
    }

    fn clear_existing(&self) -> Result<()> {
        let root = &self.root;
        let refuse = |reason: &str| InstallerError::InstallWriteFailed {
            path: root.clone(),
            reason: reason.to_owned(),
        };
        if !root.is_dir() {
            return Err(refuse("path exists and is not a directory"));
        }
        let mut entries = root
            .read_dir_utf8()
            .map_err(|e| InstallerError::write_failed(root, &e))?;
        if entries.next().is_none() {
            return Ok(());
        }
        if !self.replace_existing {
            return Err(refuse(
                "environment root is not empty; use --force to replace it",
            ));
        }
        let canonical = root
            .canonicalize_utf8()
            .map_err(|e| InstallerError::write_failed(root, &e))?;
        if canonical.parent().is_none() {
            return Err(refuse("refusing to replace a filesystem root"));
        }
        debug!("removing existing environment at {canonical}");
        fs::remove_dir_all(&canonical).map_err(|e| InstallerError::write_failed(root, &e))
    }
}

/// Install verified `fetched` content into the environment as `name`.
///
/// Archives are unpacked (with a single shared top-level directory
/// stripped); any other content is written as one file named after the last
/// segment of its URL. Returns the install location relative to the root.
///
/// The caller must have verified `fetched` against its declared digest.
///
/// # Errors
///
/// Returns [`InstallerError::UnsafeArchiveEntry`] if an entry would escape
/// its destination and [`InstallerError::InstallWriteFailed`] for any other
/// extraction or filesystem failure.
pub fn install_artifact(
    env: &InstallEnvironment,
    fetched: &FetchResult,
    name: &str,
) -> Result<Utf8PathBuf> {
    let location = InstallEnvironment::artefact_location(name);
    let dest = env.root().join(&location);
    if dest.exists() {
        return Err(InstallerError::InstallWriteFailed {
            path: dest,
            reason: "an artefact is already installed here".to_owned(),
        });
    }

    let metadata_dir = env.metadata_dir();
    let staging = tempfile::Builder::new()
        .prefix("stage-")
        .tempdir_in(&metadata_dir)
        .map_err(|e| InstallerError::write_failed(&metadata_dir, &e))?;
    let staging_dir = Utf8Path::from_path(staging.path())
        .map(|p| p.join("content"))
        .ok_or_else(|| InstallerError::InstallWriteFailed {
            path: metadata_dir.clone(),
            reason: "staging path is not valid UTF-8".to_owned(),
        })?;
    fs::create_dir_all(&staging_dir).map_err(|e| InstallerError::write_failed(&staging_dir, &e))?;

    let file_name = url_file_name(fetched.source_url()).unwrap_or(name);
    match ArchiveFormat::detect(file_name) {
        ArchiveFormat::Plain => {
            let path = staging_dir.join(file_name);
            fs::write(&path, fetched.bytes()).map_err(|e| InstallerError::write_failed(&path, &e))?;
        }
        format => {
            let entries = unpack(fetched.bytes(), format, staging_dir.as_std_path())
                .map_err(|e| extraction_error(&dest, e))?;
            debug!("unpacked {} entries for {name}", entries.len());
        }
    }

    let content = single_top_level_dir(&staging_dir)?.unwrap_or(staging_dir);
    fs::rename(&content, &dest).map_err(|e| InstallerError::write_failed(&dest, &e))?;
    Ok(location)
}

fn extraction_error(dest: &Utf8Path, err: ExtractionError) -> InstallerError {
    match err {
        ExtractionError::PathTraversal { path } => InstallerError::UnsafeArchiveEntry { entry: path },
        ExtractionError::UnsafeLink { path, target } => InstallerError::UnsafeArchiveEntry {
            entry: format!("{path} -> {target}"),
        },
        ExtractionError::ThroughLink { path, link } => InstallerError::UnsafeArchiveEntry {
            entry: format!("{path} (through link {link})"),
        },
        other => InstallerError::InstallWriteFailed {
            path: dest.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Return the only child of `dir` when it is a real directory.
fn single_top_level_dir(dir: &Utf8Path) -> Result<Option<Utf8PathBuf>> {
    let mut children = Vec::new();
    for entry in dir
        .read_dir_utf8()
        .map_err(|e| InstallerError::write_failed(dir, &e))?
    {
        let entry = entry.map_err(|e| InstallerError::write_failed(dir, &e))?;
        children.push(entry);
        if children.len() > 1 {
            return Ok(None);
        }
    }
    let Some(only) = children.pop() else {
        return Ok(None);
    };
    let file_type = only
        .file_type()
        .map_err(|e| InstallerError::write_failed(only.path(), &e))?;
    Ok(file_type.is_dir().then(|| only.path().to_owned()))
}

/// Expose `binaries` from the artefact named `package` under `bin/`.
///
/// Returns the paths written, relative to the root.
///
/// # Errors
///
/// Returns [`InstallerError::InstallWriteFailed`] if a declared binary is
/// missing from the artefact or cannot be copied.
pub fn link_binaries(
    env: &InstallEnvironment,
    package: &str,
    binaries: &[Utf8PathBuf],
) -> Result<Vec<Utf8PathBuf>> {
    let artefact_dir = env.artefact_dir(package);
    let mut linked = Vec::with_capacity(binaries.len());
    for binary in binaries {
        let source = artefact_dir.join(binary);
        if !source.is_file() {
            return Err(InstallerError::InstallWriteFailed {
                path: source,
                reason: format!("declared binary `{binary}` not found in {package}"),
            });
        }
        let file_name = binary.file_name().unwrap_or(binary.as_str());
        let relative = Utf8Path::new(BIN_DIR).join(file_name);
        let dest = env.root().join(&relative);
        fs::copy(&source, &dest).map_err(|e| InstallerError::write_failed(&dest, &e))?;
        make_executable(&dest)?;
        debug!("exposed {binary} as {relative}");
        linked.push(relative);
    }
    Ok(linked)
}

#[cfg(unix)]
fn make_executable(path: &Utf8Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| InstallerError::write_failed(path, &e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Utf8Path) -> Result<()> {
    Ok(())
}
