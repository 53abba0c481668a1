//! Validated package description types.
//!
//! Values here are only produced by the manifest parser, so every instance
//! already satisfies the manifest invariants: non-empty safe names, supported
//! URL schemes and digests of the declared algorithm's length.

use super::digest::Digest;
use camino::{Utf8Path, Utf8PathBuf};

/// A pinned dependency fetched and installed alongside the primary package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    name: String,
    url: String,
    digest: Digest,
}

impl ResourceSpec {
    pub(crate) fn new(name: String, url: String, digest: Digest) -> Self {
        Self { name, url, digest }
    }

    /// The resource name, used as its directory name in the environment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The URL the resource is fetched from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The digest the fetched bytes must match.
    #[must_use]
    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

/// Command run against an installed environment to check it works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeTestSpec {
    command: String,
    args: Vec<String>,
    expected_status: i32,
}

impl SmokeTestSpec {
    /// Create a smoke test expecting exit status zero.
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            expected_status: 0,
        }
    }

    /// Override the exit status that counts as a pass.
    #[must_use]
    pub fn with_expected_status(mut self, status: i32) -> Self {
        self.expected_status = status;
        self
    }

    /// The program to run.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The exit status that counts as a pass.
    #[must_use]
    pub const fn expected_status(&self) -> i32 {
        self.expected_status
    }

    /// The command line rendered for messages.
    #[must_use]
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A package: primary source, ordered resources and install metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) homepage: Option<String>,
    pub(crate) version: Option<String>,
    pub(crate) source_url: String,
    pub(crate) source_digest: Digest,
    pub(crate) resources: Vec<ResourceSpec>,
    pub(crate) binaries: Vec<Utf8PathBuf>,
    pub(crate) test: Option<SmokeTestSpec>,
}

impl PackageSpec {
    /// The package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// One-line description, when declared.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Project homepage, when declared.
    #[must_use]
    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    /// Package version, when declared.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// URL of the primary source archive.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Digest of the primary source archive.
    #[must_use]
    pub fn source_digest(&self) -> &Digest {
        &self.source_digest
    }

    /// Resources in declared (install) order.
    #[must_use]
    pub fn resources(&self) -> &[ResourceSpec] {
        &self.resources
    }

    /// Paths, relative to the installed primary artefact, exposed under `bin/`.
    #[must_use]
    pub fn binaries(&self) -> &[Utf8PathBuf] {
        &self.binaries
    }

    /// The declared smoke test, if any.
    #[must_use]
    pub fn test(&self) -> Option<&SmokeTestSpec> {
        self.test.as_ref()
    }

    /// The primary source viewed as a resource named after the package.
    #[must_use]
    pub fn primary(&self) -> ResourceSpec {
        ResourceSpec::new(
            self.name.clone(),
            self.source_url.clone(),
            self.source_digest.clone(),
        )
    }
}

/// The file name a single-file artefact is installed under: the last
/// non-empty path segment of its URL, without query or fragment.
#[must_use]
pub fn url_file_name(url: &str) -> Option<&str> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or(without_scheme);
    let (_, path) = path.split_once('/')?;
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .filter(|segment| Utf8Path::new(segment).file_name() == Some(*segment))
}
