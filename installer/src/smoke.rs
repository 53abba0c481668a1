//! Smoke tests against installed environments.
//!
//! A smoke test runs the manifest's declared command with the environment
//! root as working directory and `<root>/bin` first on `PATH`. It is only
//! run against environments whose receipt says the install completed.

use crate::environment::InstallEnvironment;
use crate::error::{InstallerError, Result};
use crate::manifest::SmokeTestSpec;
use camino::Utf8PathBuf;
use log::{debug, info};
use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default bound on a smoke test's run time.
pub const DEFAULT_SMOKE_TIMEOUT: Duration = Duration::from_secs(60);

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute, already resolved against the environment.
    pub program: PathBuf,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub cwd: Utf8PathBuf,
    /// `PATH` value for the child.
    pub path: OsString,
}

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The child exited on its own.
    Exited {
        /// Exit code, or `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured stdout followed by stderr.
        output: String,
    },
    /// The child was killed after exceeding its timeout.
    TimedOut {
        /// Output captured before the child was killed.
        output: String,
    },
}

/// Abstraction for running smoke-test processes.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessRunner {
    /// Run `invocation`, killing it if it outlives `timeout`.
    ///
    /// # Errors
    ///
    /// Returns any I/O error encountered while spawning the child or
    /// collecting its output.
    fn run(&self, invocation: &Invocation, timeout: Duration) -> std::io::Result<ProcessOutcome>;
}

/// Runs processes on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, invocation: &Invocation, timeout: Duration) -> std::io::Result<ProcessOutcome> {
        // Files rather than pipes, so a chatty child cannot block on a full pipe.
        let mut stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(invocation.cwd.as_std_path())
            .env("PATH", &invocation.path)
            .stdin(Stdio::null())
            .stdout(stdout.try_clone()?)
            .stderr(stderr.try_clone()?)
            .spawn()?;

        let status = match child.wait_timeout(timeout)? {
            Some(status) => Some(status),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                None
            }
        };
        let mut output = read_captured(&mut stdout)?;
        output.push_str(&read_captured(&mut stderr)?);
        Ok(match status {
            Some(status) => ProcessOutcome::Exited {
                code: status.code(),
                output,
            },
            None => ProcessOutcome::TimedOut { output },
        })
    }
}

fn read_captured(file: &mut File) -> std::io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// A passing smoke test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    /// The command line that was run.
    pub command: String,
    /// Captured stdout followed by stderr.
    pub output: String,
}

/// Runs smoke tests through a [`ProcessRunner`].
pub struct SmokeTestRunner<'a> {
    runner: &'a dyn ProcessRunner,
    timeout: Duration,
}

impl<'a> SmokeTestRunner<'a> {
    /// Create a runner with the default timeout.
    #[must_use]
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self {
            runner,
            timeout: DEFAULT_SMOKE_TIMEOUT,
        }
    }

    /// Replace the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `test` against `env`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::EnvironmentNotReady`] unless the
    /// environment's receipt records a complete install,
    /// [`InstallerError::SmokeTestTimeout`] if the command outlives the
    /// timeout and [`InstallerError::SmokeTestFailed`] if it cannot be
    /// started or exits with a status other than the expected one.
    pub fn run(&self, env: &InstallEnvironment, test: &SmokeTestSpec) -> Result<SmokeReport> {
        let receipt = env.receipt()?;
        if !receipt.is_complete() {
            let failed_at = receipt.failed_at.as_deref().unwrap_or("unknown stage");
            return Err(InstallerError::EnvironmentNotReady {
                root: env.root().to_owned(),
                reason: format!("the install did not complete (failed at {failed_at})"),
            });
        }

        let command = test.display_command();
        let invocation = build_invocation(env, test)?;
        debug!("running smoke test {command} in {}", env.root());
        let outcome = self
            .runner
            .run(&invocation, self.timeout)
            .map_err(|e| InstallerError::SmokeTestFailed {
                command: command.clone(),
                status: format!("could not start: {e}"),
                output: String::new(),
            })?;

        match outcome {
            ProcessOutcome::TimedOut { .. } => Err(InstallerError::SmokeTestTimeout {
                command,
                timeout: self.timeout,
            }),
            ProcessOutcome::Exited { code, output } if code == Some(test.expected_status()) => {
                info!("smoke test {command} passed");
                Ok(SmokeReport { command, output })
            }
            ProcessOutcome::Exited { code, output } => Err(InstallerError::SmokeTestFailed {
                command,
                status: describe_status(code, test.expected_status()),
                output,
            }),
        }
    }
}

fn describe_status(code: Option<i32>, expected: i32) -> String {
    match code {
        Some(code) => format!("exit status {code} (expected {expected})"),
        None => "terminated by a signal".to_owned(),
    }
}

/// Resolve the test command and build the child's `PATH`.
///
/// Commands containing a path separator are resolved against the root;
/// bare names are looked up in `<root>/bin` first and otherwise left to the
/// `PATH` search.
fn build_invocation(env: &InstallEnvironment, test: &SmokeTestSpec) -> Result<Invocation> {
    let bin_dir = env.bin_dir();
    let command = Path::new(test.command());
    let program = if command.is_absolute() {
        command.to_path_buf()
    } else if command.components().count() > 1 {
        env.root().as_std_path().join(command)
    } else if bin_dir.join(test.command()).is_file() {
        bin_dir.as_std_path().join(command)
    } else {
        command.to_path_buf()
    };

    let inherited = std::env::var_os("PATH").unwrap_or_default();
    let entries =
        std::iter::once(bin_dir.clone().into_std_path_buf()).chain(std::env::split_paths(&inherited));
    let path = std::env::join_paths(entries).map_err(|e| InstallerError::EnvironmentNotReady {
        root: env.root().to_owned(),
        reason: format!("cannot put {bin_dir} on PATH: {e}"),
    })?;

    Ok(Invocation {
        program,
        args: test.args().to_vec(),
        cwd: env.root().to_owned(),
        path,
    })
}

#[cfg(test)]
#[path = "smoke_tests.rs"]
mod tests;
