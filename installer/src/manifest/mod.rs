//! Package manifests: the declarative description of what to install.
//!
//! # Sub-modules
//!
//! - [`digest`]: digest algorithms and validated digest values.
//! - `model`: the validated [`PackageSpec`] and [`ResourceSpec`] types.
//! - `parser`: TOML/JSON deserialisation with per-field validation.

pub mod digest;
mod model;
mod parser;

pub use model::{PackageSpec, ResourceSpec, SmokeTestSpec, url_file_name};
pub use parser::{ManifestFormat, parse_manifest};

use crate::error::{InstallerError, Result};
use camino::Utf8Path;
use log::debug;

/// Errors arising from manifest validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// The text is not valid TOML/JSON or contains unknown fields.
    #[error("{reason}")]
    Syntax {
        /// Parser diagnostic.
        reason: String,
    },

    /// A required field is absent.
    #[error("missing field `{field}`")]
    MissingField {
        /// Dotted path of the missing field.
        field: String,
    },

    /// A field is present but its value is not acceptable.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Dotted path of the invalid field.
        field: String,
        /// Description of the constraint that was violated.
        reason: String,
    },
}

/// Read and validate the manifest at `path`.
///
/// # Errors
///
/// Returns [`InstallerError::ManifestUnreadable`] when the file cannot be
/// read and [`InstallerError::MalformedManifest`] when it fails validation.
pub fn load_manifest(path: &Utf8Path) -> Result<PackageSpec> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        InstallerError::ManifestUnreadable {
            path: path.to_owned(),
            source,
        }
    })?;
    let spec = parse_manifest(&text, ManifestFormat::from_path(path))?;
    debug!(
        "loaded manifest for {} with {} resource(s)",
        spec.name(),
        spec.resources().len()
    );
    Ok(spec)
}
