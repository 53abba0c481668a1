//! Install orchestration.
//!
//! The [`Installer`] drives fetch, verify and install for the primary
//! artefact and then each resource in declared order. The first failure ends
//! the run; the environment is left on disk with a receipt marking it
//! unusable.

use crate::environment::{
    EnvironmentBuilder, InstallEnvironment, InstallReceipt, InstalledArtefact, ReceiptStatus,
    install_artifact, link_binaries,
};
use crate::error::{ErrorKind, InstallerError, Result};
use crate::fetch::{Fetcher, RetryPolicy, fetch_with_retry};
use crate::manifest::{PackageSpec, ResourceSpec};
use crate::verify::verify;
use camino::Utf8PathBuf;
use log::{debug, error, info, warn};
use std::fmt;

pub use crate::cancel::CancellationToken;

/// Stages of an install run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    /// Nothing has happened yet.
    Pending,
    /// Downloading the primary source.
    FetchingPrimary,
    /// Checking the primary source digest.
    VerifyingPrimary,
    /// Unpacking the primary source and exposing its binaries.
    InstallingPrimary,
    /// Downloading resource `index` (zero-based).
    FetchingResource {
        /// Position in the manifest's resource list.
        index: usize,
        /// Resource name.
        name: String,
    },
    /// Checking the digest of resource `index`.
    VerifyingResource {
        /// Position in the manifest's resource list.
        index: usize,
        /// Resource name.
        name: String,
    },
    /// Unpacking resource `index`.
    InstallingResource {
        /// Position in the manifest's resource list.
        index: usize,
        /// Resource name.
        name: String,
    },
    /// Every artefact was installed.
    Done,
    /// A stage failed; later stages did not run.
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::FetchingPrimary => f.write_str("fetching primary"),
            Self::VerifyingPrimary => f.write_str("verifying primary"),
            Self::InstallingPrimary => f.write_str("installing primary"),
            Self::FetchingResource { index, name } => write!(f, "fetching resource {index} ({name})"),
            Self::VerifyingResource { index, name } => {
                write!(f, "verifying resource {index} ({name})")
            }
            Self::InstallingResource { index, name } => {
                write!(f, "installing resource {index} ({name})")
            }
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Which artefact a stage is working on.
#[derive(Debug, Clone, Copy)]
enum Target {
    Primary,
    Resource(usize),
}

impl Target {
    fn fetching(self, name: &str) -> InstallState {
        match self {
            Self::Primary => InstallState::FetchingPrimary,
            Self::Resource(index) => InstallState::FetchingResource {
                index,
                name: name.to_owned(),
            },
        }
    }

    fn verifying(self, name: &str) -> InstallState {
        match self {
            Self::Primary => InstallState::VerifyingPrimary,
            Self::Resource(index) => InstallState::VerifyingResource {
                index,
                name: name.to_owned(),
            },
        }
    }

    fn installing(self, name: &str) -> InstallState {
        match self {
            Self::Primary => InstallState::InstallingPrimary,
            Self::Resource(index) => InstallState::InstallingResource {
                index,
                name: name.to_owned(),
            },
        }
    }
}

/// Result of an install run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// True only when the run reached [`InstallState::Done`].
    pub succeeded: bool,
    /// Name of the package or resource being processed when the run failed.
    pub failed_at: Option<String>,
    /// Classification of the first error.
    pub error_kind: Option<ErrorKind>,
    /// Message of the first error.
    pub error_message: Option<String>,
    /// The state the run ended in.
    pub final_state: InstallState,
    /// Every state entered, in order, starting with `Pending`.
    pub history: Vec<InstallState>,
    /// Root of the environment.
    pub root: Utf8PathBuf,
    /// Names of the artefacts installed, in install order.
    pub installed: Vec<String>,
    /// True when a failed run left a partially built environment at `root`.
    ///
    /// False when the run failed before creating the environment, such as
    /// when an existing root was refused.
    pub left_incomplete: bool,
}

/// Drives installs against a [`Fetcher`].
pub struct Installer<'a> {
    fetcher: &'a dyn Fetcher,
    retry: RetryPolicy,
    cancellation: CancellationToken,
}

impl<'a> Installer<'a> {
    /// Create an installer using the default retry policy.
    #[must_use]
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self {
            fetcher,
            retry: RetryPolicy::default(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Replace the retry policy used for every fetch.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Observe `token` for cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Install `spec` into the environment `builder` creates.
    ///
    /// Never returns an error: failures are reported through
    /// [`InstallOutcome`], and the receipt written under the root records the
    /// same result.
    pub fn install(&self, spec: &PackageSpec, builder: &EnvironmentBuilder) -> InstallOutcome {
        let mut run = Run::new(spec);
        let result = builder
            .create()
            .and_then(|env| self.install_all(spec, &env, &mut run).map(|()| env));
        match result {
            Ok(env) => self.finish_success(spec, builder, &env, run),
            Err(err) => self.finish_failure(spec, builder, run, &err),
        }
    }

    fn install_all(
        &self,
        spec: &PackageSpec,
        env: &InstallEnvironment,
        run: &mut Run,
    ) -> Result<()> {
        run.root = env.root().to_owned();
        let primary = spec.primary();
        self.install_one(env, run, &primary, Target::Primary)?;
        if !spec.binaries().is_empty() {
            link_binaries(env, spec.name(), spec.binaries())?;
        }
        for (index, resource) in spec.resources().iter().enumerate() {
            self.install_one(env, run, resource, Target::Resource(index))?;
        }
        Ok(())
    }

    fn install_one(
        &self,
        env: &InstallEnvironment,
        run: &mut Run,
        artefact: &ResourceSpec,
        target: Target,
    ) -> Result<()> {
        let name = artefact.name();
        run.current = name.to_owned();

        self.check_cancelled()?;
        run.enter(target.fetching(name));
        info!("fetching {name} from {}", artefact.url());
        let fetched = fetch_with_retry(
            self.fetcher,
            &self.retry,
            &self.cancellation,
            artefact.url(),
        )?;

        self.check_cancelled()?;
        run.enter(target.verifying(name));
        verify(fetched.bytes(), artefact.digest())?;

        self.check_cancelled()?;
        run.enter(target.installing(name));
        let location = install_artifact(env, &fetched, name)?;
        info!("installed {name} into {location}");
        run.installed.push(InstalledArtefact {
            name: name.to_owned(),
            url: artefact.url().to_owned(),
            digest: artefact.digest().to_string(),
            location,
        });
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            Err(InstallerError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn finish_success(
        &self,
        spec: &PackageSpec,
        builder: &EnvironmentBuilder,
        env: &InstallEnvironment,
        mut run: Run,
    ) -> InstallOutcome {
        let receipt = run.receipt(spec, ReceiptStatus::Complete, None);
        if let Err(err) = receipt.write(env.root()) {
            run.current = spec.name().to_owned();
            return self.finish_failure(spec, builder, run, &err);
        }
        run.enter(InstallState::Done);
        info!("installed {} into {}", spec.name(), env.root());
        run.into_outcome(None)
    }

    fn finish_failure(
        &self,
        spec: &PackageSpec,
        builder: &EnvironmentBuilder,
        mut run: Run,
        err: &InstallerError,
    ) -> InstallOutcome {
        error!("install of {} failed at {}: {err}", spec.name(), run.current);
        if run.root.as_str().is_empty() {
            // The environment was never created, so there is no receipt to write.
            run.root = builder.root().to_owned();
        } else {
            run.left_incomplete = true;
            let receipt = run.receipt(spec, ReceiptStatus::Failed, Some(err.kind()));
            if let Err(write_err) = receipt.write(&run.root) {
                warn!("could not record failure receipt: {write_err}");
            }
        }
        run.enter(InstallState::Failed);
        run.into_outcome(Some(err))
    }
}

/// Mutable bookkeeping for one run.
struct Run {
    history: Vec<InstallState>,
    installed: Vec<InstalledArtefact>,
    current: String,
    root: Utf8PathBuf,
    left_incomplete: bool,
}

impl Run {
    fn new(spec: &PackageSpec) -> Self {
        Self {
            history: vec![InstallState::Pending],
            installed: Vec::new(),
            current: spec.name().to_owned(),
            root: Utf8PathBuf::new(),
            left_incomplete: false,
        }
    }

    fn enter(&mut self, state: InstallState) {
        if let Some(previous) = self.history.last() {
            debug!("{previous} -> {state}");
        }
        self.history.push(state);
    }

    fn receipt(
        &self,
        spec: &PackageSpec,
        status: ReceiptStatus,
        error_kind: Option<ErrorKind>,
    ) -> InstallReceipt {
        InstallReceipt {
            package: spec.name().to_owned(),
            version: spec.version().map(str::to_owned),
            status,
            failed_at: error_kind.map(|_| self.current.clone()),
            error_kind,
            installed: self.installed.clone(),
        }
    }

    fn into_outcome(self, err: Option<&InstallerError>) -> InstallOutcome {
        let final_state = self
            .history
            .last()
            .cloned()
            .unwrap_or(InstallState::Pending);
        InstallOutcome {
            succeeded: err.is_none(),
            failed_at: err.map(|_| self.current),
            error_kind: err.map(InstallerError::kind),
            error_message: err.map(ToString::to_string),
            final_state,
            history: self.history,
            root: self.root,
            installed: self.installed.into_iter().map(|a| a.name).collect(),
            left_incomplete: self.left_incomplete,
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
