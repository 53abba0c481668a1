//! Output formatting for the pinstall CLI.
//!
//! Progress and results go to stderr as plain lines; these helpers keep the
//! wording in one place so the binary and its tests agree.

use crate::error::ErrorKind;
use crate::manifest::PackageSpec;
use crate::orchestrator::InstallOutcome;
use crate::smoke::SmokeReport;
use std::io::Write;

/// Write `message` and a newline, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Line announcing the start of an install.
#[must_use]
pub fn install_banner(spec: &PackageSpec) -> String {
    let resources = spec.resources().len();
    match spec.version() {
        Some(version) => format!(
            "Installing {} {version} with {resources} resource(s)",
            spec.name()
        ),
        None => format!("Installing {} with {resources} resource(s)", spec.name()),
    }
}

/// Summary of a successful install.
///
/// # Example
///
/// ```
/// use camino::Utf8PathBuf;
/// use pinstall::orchestrator::{InstallOutcome, InstallState};
/// use pinstall::output::success_message;
///
/// let outcome = InstallOutcome {
///     succeeded: true,
///     failed_at: None,
///     error_kind: None,
///     error_message: None,
///     final_state: InstallState::Done,
///     history: vec![InstallState::Pending, InstallState::Done],
///     root: Utf8PathBuf::from("/envs/tool"),
///     installed: vec!["tool".to_owned(), "dep".to_owned()],
///     left_incomplete: false,
/// };
/// assert_eq!(
///     success_message(&outcome),
///     "Installed 2 artefact(s) into /envs/tool"
/// );
/// ```
#[must_use]
pub fn success_message(outcome: &InstallOutcome) -> String {
    format!(
        "Installed {} artefact(s) into {}",
        outcome.installed.len(),
        outcome.root
    )
}

/// Stage-identifying description of a failed install.
#[must_use]
pub fn failure_message(outcome: &InstallOutcome) -> String {
    let failed_at = outcome.failed_at.as_deref().unwrap_or("unknown");
    let detail = outcome.error_message.as_deref().unwrap_or("unknown error");
    format!("install failed at {failed_at}: {detail}")
}

/// Note telling the user a failed environment was left in place.
#[must_use]
pub fn environment_left_message(outcome: &InstallOutcome) -> String {
    format!(
        "The environment at {} is incomplete and marked unusable; reinstall with --force",
        outcome.root
    )
}

/// Summary of a passing smoke test.
#[must_use]
pub fn smoke_passed_message(report: &SmokeReport) -> String {
    format!("Smoke test passed: {}", report.command)
}

/// The final error line: the error kind followed by its description.
#[must_use]
pub fn error_line(kind: ErrorKind, message: &str) -> String {
    format!("error[{kind}]: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestFormat, parse_manifest};
    use crate::orchestrator::InstallState;
    use camino::Utf8PathBuf;

    fn failed_outcome() -> InstallOutcome {
        InstallOutcome {
            succeeded: false,
            failed_at: Some("dep".to_owned()),
            error_kind: Some(ErrorKind::DigestMismatch),
            error_message: Some("digest mismatch: expected aa, got bb".to_owned()),
            final_state: InstallState::Failed,
            history: vec![InstallState::Pending, InstallState::Failed],
            root: Utf8PathBuf::from("/envs/pkg"),
            installed: vec!["pkg".to_owned()],
            left_incomplete: true,
        }
    }

    #[test]
    fn failure_message_names_stage_and_cause() {
        assert_eq!(
            failure_message(&failed_outcome()),
            "install failed at dep: digest mismatch: expected aa, got bb"
        );
    }

    #[test]
    fn environment_left_message_names_root() {
        assert!(environment_left_message(&failed_outcome()).contains("/envs/pkg"));
    }

    #[test]
    fn banner_includes_version_when_declared() {
        let digest = "0".repeat(64);
        let spec = parse_manifest(
            &format!(
                "name = \"tool\"\nversion = \"2.1\"\nurl = \"https://example.test/t.tgz\"\nsha256 = \"{digest}\"\n"
            ),
            ManifestFormat::Toml,
        )
        .expect("manifest");
        assert_eq!(install_banner(&spec), "Installing tool 2.1 with 0 resource(s)");
    }

    #[test]
    fn error_line_prefixes_kind() {
        assert_eq!(
            error_line(ErrorKind::FetchFailed, "not found"),
            "error[FetchFailed]: not found"
        );
    }

    #[test]
    fn write_stderr_line_appends_newline() {
        let mut buffer = Vec::new();
        write_stderr_line(&mut buffer, "hello");
        assert_eq!(buffer, b"hello\n");
    }
}
