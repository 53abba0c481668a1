//! Manifest deserialisation and validation.
//!
//! Manifests are read into an all-optional raw form first so that a missing
//! field is reported by name rather than as a generic syntax error. The raw
//! form is then validated into a [`PackageSpec`].

use super::ManifestError;
use super::digest::{Digest, DigestAlgorithm};
use super::model::{PackageSpec, ResourceSpec, SmokeTestSpec};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::HashSet;

/// Serialisation formats accepted for manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// TOML, the default.
    Toml,
    /// JSON.
    Json,
}

impl ManifestFormat {
    /// Choose the format from a manifest path's extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use pinstall::manifest::ManifestFormat;
    ///
    /// assert_eq!(ManifestFormat::from_path(Utf8Path::new("tool.json")), ManifestFormat::Json);
    /// assert_eq!(ManifestFormat::from_path(Utf8Path::new("tool.toml")), ManifestFormat::Toml);
    /// ```
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    name: Option<String>,
    description: Option<String>,
    homepage: Option<String>,
    version: Option<String>,
    url: Option<String>,
    sha256: Option<String>,
    sha512: Option<String>,
    #[serde(default)]
    binaries: Vec<String>,
    #[serde(default, alias = "resources")]
    resource: Vec<RawResource>,
    test: Option<RawSmokeTest>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResource {
    name: Option<String>,
    url: Option<String>,
    sha256: Option<String>,
    sha512: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSmokeTest {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    expected_status: i32,
}

/// Parse manifest text in the given format into a validated [`PackageSpec`].
///
/// # Errors
///
/// Returns [`ManifestError`] naming the offending field when the text does
/// not parse or a field is missing or invalid.
///
/// # Examples
///
/// ```
/// use pinstall::manifest::{ManifestFormat, parse_manifest};
///
/// let text = format!(
///     "name = \"tool\"\nurl = \"https://example.test/tool-1.0.tar.gz\"\nsha256 = \"{}\"\n",
///     "a".repeat(64),
/// );
/// let spec = parse_manifest(&text, ManifestFormat::Toml).expect("valid manifest");
/// assert_eq!(spec.name(), "tool");
/// assert!(spec.resources().is_empty());
/// ```
pub fn parse_manifest(text: &str, format: ManifestFormat) -> Result<PackageSpec, ManifestError> {
    let raw: RawManifest = match format {
        ManifestFormat::Toml => toml::from_str(text).map_err(|e| ManifestError::Syntax {
            reason: e.message().to_owned(),
        })?,
        ManifestFormat::Json => serde_json::from_str(text).map_err(|e| ManifestError::Syntax {
            reason: e.to_string(),
        })?,
    };
    validate(raw)
}

fn validate(raw: RawManifest) -> Result<PackageSpec, ManifestError> {
    let name = required(raw.name, "name")?;
    validate_name(&name, "name")?;
    let source_url = required(raw.url, "url")?;
    validate_url(&source_url, "url")?;
    let source_digest = declared_digest(raw.sha256, raw.sha512, "")?;

    let mut seen = HashSet::from([name.clone()]);
    let resources = raw
        .resource
        .into_iter()
        .enumerate()
        .map(|(index, resource)| validate_resource(resource, index, &mut seen))
        .collect::<Result<Vec<_>, _>>()?;

    let binaries = raw
        .binaries
        .iter()
        .enumerate()
        .map(|(index, path)| validate_binary(path, index))
        .collect::<Result<Vec<_>, _>>()?;

    let test = raw.test.map(validate_smoke_test).transpose()?;

    Ok(PackageSpec {
        name,
        description: raw.description,
        homepage: raw.homepage,
        version: raw.version,
        source_url,
        source_digest,
        resources,
        binaries,
        test,
    })
}

fn validate_resource(
    raw: RawResource,
    index: usize,
    seen: &mut HashSet<String>,
) -> Result<ResourceSpec, ManifestError> {
    let prefix = format!("resource[{index}].");
    let name = required(raw.name, &format!("{prefix}name"))?;
    validate_name(&name, &format!("{prefix}name"))?;
    if !seen.insert(name.clone()) {
        return Err(ManifestError::InvalidField {
            field: format!("{prefix}name"),
            reason: format!("duplicate name \"{name}\""),
        });
    }
    let url = required(raw.url, &format!("{prefix}url"))?;
    validate_url(&url, &format!("{prefix}url"))?;
    let digest = declared_digest(raw.sha256, raw.sha512, &prefix)?;
    Ok(ResourceSpec::new(name, url, digest))
}

fn validate_smoke_test(raw: RawSmokeTest) -> Result<SmokeTestSpec, ManifestError> {
    let command = required(raw.command, "test.command")?;
    if command.trim().is_empty() {
        return Err(ManifestError::InvalidField {
            field: "test.command".to_owned(),
            reason: "must not be empty".to_owned(),
        });
    }
    Ok(SmokeTestSpec::new(command, raw.args).with_expected_status(raw.expected_status))
}

fn required(value: Option<String>, field: &str) -> Result<String, ManifestError> {
    value.ok_or_else(|| ManifestError::MissingField {
        field: field.to_owned(),
    })
}

/// Names become directory names, so they must be a single normal component.
fn validate_name(name: &str, field: &str) -> Result<(), ManifestError> {
    let mut components = Utf8Path::new(name).components();
    let is_single_normal = matches!(
        (components.next(), components.next()),
        (Some(Utf8Component::Normal(part)), None) if part == name
    );
    if is_single_normal && !name.contains('\\') {
        return Ok(());
    }
    Err(ManifestError::InvalidField {
        field: field.to_owned(),
        reason: format!("\"{name}\" is not a plain file name"),
    })
}

fn validate_url(url: &str, field: &str) -> Result<(), ManifestError> {
    const SCHEMES: [&str; 3] = ["https://", "http://", "file://"];
    match SCHEMES.iter().find(|scheme| url.starts_with(**scheme)) {
        Some(scheme) if url.len() > scheme.len() => Ok(()),
        Some(_) => Err(ManifestError::InvalidField {
            field: field.to_owned(),
            reason: "URL has no location".to_owned(),
        }),
        None => Err(ManifestError::InvalidField {
            field: field.to_owned(),
            reason: format!("unsupported URL scheme in \"{url}\"; expected https, http or file"),
        }),
    }
}

fn declared_digest(
    sha256: Option<String>,
    sha512: Option<String>,
    prefix: &str,
) -> Result<Digest, ManifestError> {
    let (algorithm, value) = match (sha256, sha512) {
        (Some(value), None) => (DigestAlgorithm::Sha256, value),
        (None, Some(value)) => (DigestAlgorithm::Sha512, value),
        (None, None) => {
            return Err(ManifestError::MissingField {
                field: format!("{prefix}sha256"),
            });
        }
        (Some(_), Some(_)) => {
            return Err(ManifestError::InvalidField {
                field: format!("{prefix}sha256"),
                reason: "declare exactly one of sha256 or sha512".to_owned(),
            });
        }
    };
    Digest::from_hex(algorithm, &value).map_err(|reason| ManifestError::InvalidField {
        field: format!("{prefix}{}", algorithm.key()),
        reason,
    })
}

fn validate_binary(path: &str, index: usize) -> Result<Utf8PathBuf, ManifestError> {
    let candidate = Utf8PathBuf::from(path);
    let is_relative_and_contained = !path.is_empty()
        && candidate
            .components()
            .all(|component| matches!(component, Utf8Component::Normal(_)));
    if is_relative_and_contained {
        return Ok(candidate);
    }
    Err(ManifestError::InvalidField {
        field: format!("binaries[{index}]"),
        reason: format!("\"{path}\" must be a relative path inside the package"),
    })
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
