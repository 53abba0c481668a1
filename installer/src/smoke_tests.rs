//! Tests for the smoke test runner.

use super::*;
use crate::environment::{EnvironmentBuilder, InstallReceipt, ReceiptStatus};
use crate::error::ErrorKind;
use rstest::{fixture, rstest};
use std::fs;

struct TempEnv {
    _dir: tempfile::TempDir,
    env: InstallEnvironment,
}

fn environment(status: ReceiptStatus) -> TempEnv {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(dir.path().join("env")).expect("utf8 path");
    let env = EnvironmentBuilder::new(root).create().expect("create env");
    let failed = status == ReceiptStatus::Failed;
    InstallReceipt {
        package: "tool".to_owned(),
        version: None,
        status,
        failed_at: failed.then(|| "dep".to_owned()),
        error_kind: failed.then_some(ErrorKind::DigestMismatch),
        installed: Vec::new(),
    }
    .write(env.root())
    .expect("write receipt");
    TempEnv { _dir: dir, env }
}

#[fixture]
fn complete_env() -> TempEnv {
    environment(ReceiptStatus::Complete)
}

fn help_test() -> SmokeTestSpec {
    SmokeTestSpec::new("bin/tool", vec!["--help".to_owned()])
}

fn exited(code: i32, output: &str) -> ProcessOutcome {
    ProcessOutcome::Exited {
        code: Some(code),
        output: output.to_owned(),
    }
}

#[rstest]
fn passes_on_expected_status(complete_env: TempEnv) {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_run()
        .times(1)
        .returning(|_, _| Ok(exited(0, "usage: tool")));

    let report = SmokeTestRunner::new(&runner)
        .run(&complete_env.env, &help_test())
        .expect("smoke test passes");
    assert_eq!(report.command, "bin/tool --help");
    assert_eq!(report.output, "usage: tool");
}

#[rstest]
fn resolves_relative_command_against_root(complete_env: TempEnv) {
    let root = complete_env.env.root().to_owned();
    let expected_program = root.join("bin/tool").into_std_path_buf();
    let mut runner = MockProcessRunner::new();
    runner
        .expect_run()
        .withf(move |invocation, timeout| {
            invocation.program == expected_program
                && invocation.cwd == root
                && invocation.args == ["--help"]
                && *timeout == DEFAULT_SMOKE_TIMEOUT
        })
        .returning(|_, _| Ok(exited(0, "")));

    assert!(
        SmokeTestRunner::new(&runner)
            .run(&complete_env.env, &help_test())
            .is_ok()
    );
}

#[rstest]
fn path_starts_with_environment_bin(complete_env: TempEnv) {
    let bin_dir = complete_env.env.bin_dir().into_std_path_buf();
    let mut runner = MockProcessRunner::new();
    runner
        .expect_run()
        .withf(move |invocation, _| {
            std::env::split_paths(&invocation.path).next().as_ref() == Some(&bin_dir)
        })
        .returning(|_, _| Ok(exited(0, "")));

    let test = SmokeTestSpec::new("sh", Vec::new());
    assert!(SmokeTestRunner::new(&runner).run(&complete_env.env, &test).is_ok());
}

#[rstest]
fn bare_command_prefers_environment_binary(complete_env: TempEnv) {
    let exposed = complete_env.env.bin_dir().join("tool");
    fs::write(&exposed, "#!/bin/sh\n").expect("write binary");
    let expected_program = exposed.into_std_path_buf();
    let mut runner = MockProcessRunner::new();
    runner
        .expect_run()
        .withf(move |invocation, _| invocation.program == expected_program)
        .returning(|_, _| Ok(exited(0, "")));

    let test = SmokeTestSpec::new("tool", Vec::new());
    assert!(SmokeTestRunner::new(&runner).run(&complete_env.env, &test).is_ok());
}

#[rstest]
fn unexpected_status_fails_with_output(complete_env: TempEnv) {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_run()
        .returning(|_, _| Ok(exited(2, "error: unknown flag")));

    let err = SmokeTestRunner::new(&runner)
        .run(&complete_env.env, &help_test())
        .expect_err("failing smoke test");
    assert_eq!(err.kind(), ErrorKind::SmokeTestFailed);
    let message = err.to_string();
    assert!(message.contains("exit status 2 (expected 0)"));
    assert!(message.contains("error: unknown flag"));
}

#[rstest]
fn expected_status_can_be_non_zero(complete_env: TempEnv) {
    let mut runner = MockProcessRunner::new();
    runner.expect_run().returning(|_, _| Ok(exited(1, "")));

    let test = help_test().with_expected_status(1);
    assert!(SmokeTestRunner::new(&runner).run(&complete_env.env, &test).is_ok());
}

#[rstest]
fn timeout_is_reported(complete_env: TempEnv) {
    let mut runner = MockProcessRunner::new();
    runner.expect_run().returning(|_, _| {
        Ok(ProcessOutcome::TimedOut {
            output: String::new(),
        })
    });

    let err = SmokeTestRunner::new(&runner)
        .with_timeout(Duration::from_secs(5))
        .run(&complete_env.env, &help_test())
        .expect_err("timed out");
    assert_eq!(err.kind(), ErrorKind::SmokeTestTimeout);
    assert!(err.to_string().contains("after 5s"));
}

#[rstest]
fn spawn_failure_is_a_failed_test(complete_env: TempEnv) {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_run()
        .returning(|_, _| Err(std::io::Error::from(std::io::ErrorKind::NotFound)));

    let err = SmokeTestRunner::new(&runner)
        .run(&complete_env.env, &help_test())
        .expect_err("cannot start");
    assert_eq!(err.kind(), ErrorKind::SmokeTestFailed);
    assert!(err.to_string().contains("could not start"));
}

#[test]
fn refuses_failed_environment() {
    let failed = environment(ReceiptStatus::Failed);
    let mut runner = MockProcessRunner::new();
    runner.expect_run().never();

    let err = SmokeTestRunner::new(&runner)
        .run(&failed.env, &help_test())
        .expect_err("not ready");
    assert_eq!(err.kind(), ErrorKind::EnvironmentNotReady);
    assert!(err.to_string().contains("failed at dep"));
}

#[test]
fn refuses_environment_without_receipt() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 path");
    let env = InstallEnvironment::open(&root).expect("open");
    let mut runner = MockProcessRunner::new();
    runner.expect_run().never();

    let err = SmokeTestRunner::new(&runner)
        .run(&env, &help_test())
        .expect_err("not ready");
    assert_eq!(err.kind(), ErrorKind::EnvironmentNotReady);
}

#[cfg(unix)]
mod system {
    use super::*;

    fn script(env: &InstallEnvironment, body: &str) {
        let path = env.bin_dir().join("tool");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    }

    /// Runs the script through `sh` so a freshly written file is never exec'd
    /// directly while another test thread forks.
    fn sh_test() -> SmokeTestSpec {
        SmokeTestSpec::new("sh", vec!["bin/tool".to_owned(), "--help".to_owned()])
    }

    #[rstest]
    fn captures_output_of_real_process(complete_env: TempEnv) {
        script(&complete_env.env, "echo out; echo err >&2; pwd");

        let report = SmokeTestRunner::new(&SystemProcessRunner)
            .run(&complete_env.env, &sh_test())
            .expect("script passes");
        assert!(report.output.contains("out"));
        assert!(report.output.contains("err"));
        assert!(report.output.contains(complete_env.env.root().as_str()));
    }

    #[rstest]
    fn reports_real_exit_status(complete_env: TempEnv) {
        script(&complete_env.env, "exit 3");

        let err = SmokeTestRunner::new(&SystemProcessRunner)
            .run(&complete_env.env, &sh_test())
            .expect_err("non-zero exit");
        assert!(err.to_string().contains("exit status 3"));
    }

    #[rstest]
    fn kills_process_after_timeout(complete_env: TempEnv) {
        script(&complete_env.env, "sleep 5");

        let started = std::time::Instant::now();
        let err = SmokeTestRunner::new(&SystemProcessRunner)
            .with_timeout(Duration::from_millis(200))
            .run(&complete_env.env, &sh_test())
            .expect_err("timed out");
        assert_eq!(err.kind(), ErrorKind::SmokeTestTimeout);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
