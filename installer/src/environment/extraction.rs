//! Archive extraction for verified artefacts.
//!
//! Unpacks `.tar.gz`, `.tar.zst`, `.tar` and `.zip` archives from memory with
//! path traversal protection. Every entry is checked before anything is
//! written, so an archive with one unsafe entry produces no files at all.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

/// Archive formats recognised from an artefact's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball (`.tar.gz`, `.tgz`).
    TarGz,
    /// Zstandard-compressed tarball (`.tar.zst`, `.tzst`).
    TarZst,
    /// Uncompressed tarball.
    Tar,
    /// Zip archive, including Python wheels.
    Zip,
    /// Not an archive; installed as a single file.
    Plain,
}

impl ArchiveFormat {
    /// Detect the format from a file name suffix.
    ///
    /// # Examples
    ///
    /// ```
    /// use pinstall::environment::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::detect("requests-2.13.0.tar.gz"), ArchiveFormat::TarGz);
    /// assert_eq!(ArchiveFormat::detect("tool"), ArchiveFormat::Plain);
    /// ```
    #[must_use]
    pub fn detect(file_name: &str) -> Self {
        let lower = file_name.to_ascii_lowercase();
        let has = |suffixes: &[&str]| suffixes.iter().any(|s| lower.ends_with(s));
        if has(&[".tar.gz", ".tgz"]) {
            Self::TarGz
        } else if has(&[".tar.zst", ".tzst"]) {
            Self::TarZst
        } else if has(&[".tar"]) {
            Self::Tar
        } else if has(&[".zip", ".whl"]) {
            Self::Zip
        } else {
            Self::Plain
        }
    }
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error while decoding or writing.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container could not be read.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An entry path resolves outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// A link entry points outside the destination.
    #[error("link {path} points outside the archive: {target}")]
    UnsafeLink {
        /// The link entry path.
        path: String,
        /// The link target.
        target: String,
    },

    /// An entry path or link target passes through a link declared earlier
    /// in the same archive.
    #[error("{path} passes through link {link}")]
    ThroughLink {
        /// The offending entry path or link target.
        path: String,
        /// The earlier link entry it traverses.
        link: String,
    },

    /// The archive contains no entries.
    #[error("archive contains no entries")]
    EmptyArchive,

    /// [`ArchiveFormat::Plain`] content was passed to [`unpack`].
    #[error("content is not an archive")]
    NotAnArchive,
}

impl ExtractionError {
    /// Return true when the error is a rejected entry rather than an I/O fault.
    #[must_use]
    pub fn is_unsafe_entry(&self) -> bool {
        matches!(
            self,
            Self::PathTraversal { .. } | Self::UnsafeLink { .. } | Self::ThroughLink { .. }
        )
    }
}

/// Unpack archive `bytes` of `format` into `dest_dir`.
///
/// Returns the normalised relative paths of the entries written.
///
/// # Errors
///
/// Returns [`ExtractionError::PathTraversal`] or
/// [`ExtractionError::UnsafeLink`] before writing anything if any entry
/// would escape `dest_dir`, [`ExtractionError::EmptyArchive`] if there are no
/// entries, and [`ExtractionError::Io`]/[`ExtractionError::Zip`] on decoding
/// or write failures.
pub fn unpack(
    bytes: &[u8],
    format: ArchiveFormat,
    dest_dir: &Path,
) -> Result<Vec<String>, ExtractionError> {
    let extracted = match format {
        ArchiveFormat::TarGz | ArchiveFormat::TarZst | ArchiveFormat::Tar => {
            validate_tar(tar::Archive::new(tar_reader(bytes, format)?))?;
            extract_tar(tar::Archive::new(tar_reader(bytes, format)?), dest_dir)?
        }
        ArchiveFormat::Zip => {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
            validate_zip(&mut archive)?;
            extract_zip(&mut archive, dest_dir)?
        }
        ArchiveFormat::Plain => return Err(ExtractionError::NotAnArchive),
    };
    if extracted.is_empty() {
        return Err(ExtractionError::EmptyArchive);
    }
    Ok(extracted)
}

fn tar_reader(bytes: &[u8], format: ArchiveFormat) -> std::io::Result<Box<dyn Read + '_>> {
    Ok(match format {
        ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(bytes)),
        ArchiveFormat::TarZst => Box::new(zstd::Decoder::new(bytes)?),
        _ => Box::new(bytes),
    })
}

/// Reject entries that escape, and entries or link targets that pass through
/// an earlier symlink, since the filesystem would follow it on extraction.
fn validate_tar<R: Read>(mut archive: tar::Archive<R>) -> Result<(), ExtractionError> {
    let mut symlinks = HashSet::new();
    for entry_result in archive.entries()? {
        let entry = entry_result?;
        let entry_path = entry.path()?.into_owned();
        let normalised = normalise_entry_path(&entry_path)?;
        reject_link_crossing(&normalised, &symlinks, false)?;
        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            let target = entry.link_name()?.map(|t| t.into_owned()).unwrap_or_default();
            // Symlinks resolve from their own directory, hard links from the root.
            let base = if kind.is_symlink() {
                normalised.parent().map(Path::to_path_buf).unwrap_or_default()
            } else {
                PathBuf::new()
            };
            let unsafe_link = || ExtractionError::UnsafeLink {
                path: entry_path.display().to_string(),
                target: target.display().to_string(),
            };
            if target.is_absolute() {
                return Err(unsafe_link());
            }
            let joined = base.join(&target);
            normalise_entry_path(&joined).map_err(|_| unsafe_link())?;
            reject_link_crossing(&joined, &symlinks, true)?;
        }
        if kind.is_symlink() {
            symlinks.insert(normalised);
        }
    }
    Ok(())
}

/// Walk `path` component by component and fail if any prefix is a symlink
/// from `symlinks`. The final component may name a symlink only when
/// `allow_final` is set.
fn reject_link_crossing(
    path: &Path,
    symlinks: &HashSet<PathBuf>,
    allow_final: bool,
) -> Result<(), ExtractionError> {
    let components: Vec<Component<'_>> = path.components().collect();
    let mut current = PathBuf::new();
    for (position, component) in components.iter().enumerate() {
        match component {
            Component::Normal(part) => current.push(part),
            Component::ParentDir => {
                current.pop();
                continue;
            }
            _ => continue,
        }
        let is_final = position + 1 == components.len();
        if symlinks.contains(&current) && !(is_final && allow_final) {
            return Err(ExtractionError::ThroughLink {
                path: path.display().to_string(),
                link: current.display().to_string(),
            });
        }
    }
    Ok(())
}

fn extract_tar<R: Read>(
    mut archive: tar::Archive<R>,
    dest_dir: &Path,
) -> Result<Vec<String>, ExtractionError> {
    let mut extracted = Vec::new();
    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let relative = normalise_entry_path(&entry.path()?)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let dest_path = dest_dir.join(&relative);
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if entry.header().entry_type().is_hard_link() {
            let target = entry.link_name()?.map(|t| t.into_owned()).unwrap_or_default();
            fs::copy(dest_dir.join(normalise_entry_path(&target)?), &dest_path)?;
        } else {
            entry.unpack(&dest_path)?;
        }
        extracted.push(relative.display().to_string());
    }
    Ok(extracted)
}

fn validate_zip<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<(), ExtractionError> {
    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        normalise_entry_path(Path::new(file.name()))?;
    }
    Ok(())
}

fn extract_zip<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    dest_dir: &Path,
) -> Result<Vec<String>, ExtractionError> {
    let mut extracted = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let relative = normalise_entry_path(Path::new(file.name()))?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let dest_path = dest_dir.join(&relative);
        if file.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&dest_path)?;
            std::io::copy(&mut file, &mut out)?;
            apply_unix_mode(&dest_path, file.unix_mode())?;
        }
        extracted.push(relative.display().to_string());
    }
    Ok(extracted)
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) -> std::io::Result<()> {
    Ok(())
}

/// Resolve `.` and `..` lexically and reject anything that leaves the root.
fn normalise_entry_path(path: &Path) -> Result<PathBuf, ExtractionError> {
    let mut parts: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(traversal(path));
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal(path)),
        }
    }
    Ok(parts.iter().collect())
}

fn traversal(path: &Path) -> ExtractionError {
    ExtractionError::PathTraversal {
        path: path.display().to_string(),
    }
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
