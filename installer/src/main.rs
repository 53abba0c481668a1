//! pinstall CLI entrypoint.
//!
//! Installs a manifest's package and pinned resources into an isolated
//! environment, and runs the manifest's smoke test against an installed
//! environment.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::debug;
use pinstall::cli::{Cli, Command, InstallArgs, TestArgs};
use pinstall::config::InstallerConfig;
use pinstall::dirs::{BaseDirs, SystemBaseDirs};
use pinstall::environment::{EnvironmentBuilder, InstallEnvironment};
use pinstall::error::{ErrorKind, InstallerError};
use pinstall::fetch::HttpFetcher;
use pinstall::manifest::{PackageSpec, SmokeTestSpec, load_manifest};
use pinstall::orchestrator::Installer;
use pinstall::output::{
    environment_left_message, error_line, failure_message, install_banner, smoke_passed_message,
    success_message, write_stderr_line,
};
use pinstall::smoke::{SmokeTestRunner, SystemProcessRunner};
use std::io::Write;
use std::time::Duration;

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "PINSTALL_LOG";

/// A failure reported to the user: its classification and description.
#[derive(Debug)]
struct Failure {
    kind: ErrorKind,
    message: String,
}

impl From<InstallerError> for Failure {
    fn from(err: InstallerError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

type RunResult = Result<(), Failure>;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level());
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &SystemBaseDirs, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env(LOG_ENV)
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli, dirs: &dyn BaseDirs, stderr: &mut dyn Write) -> RunResult {
    let config = InstallerConfig::load(cli.config.as_deref(), dirs)?;
    match &cli.command {
        Command::Install(args) => run_install(cli, args, &config, dirs, stderr),
        Command::Test(args) => run_test(cli, args, &config, dirs, stderr),
    }
}

fn run_install(
    cli: &Cli,
    args: &InstallArgs,
    config: &InstallerConfig,
    dirs: &dyn BaseDirs,
    stderr: &mut dyn Write,
) -> RunResult {
    let spec = load_manifest(&args.manifest)?;
    // Check for a smoke test before touching the filesystem.
    let smoke_test = if args.run_test {
        Some(declared_smoke_test(&spec)?)
    } else {
        None
    };
    let root = resolve_root(args.prefix.as_deref(), config, &spec, dirs)?;

    let mut fetch = config.fetch.clone();
    if let Some(retries) = args.retries {
        fetch.max_retries = retries;
    }
    if let Some(timeout) = args.fetch_timeout {
        fetch.timeout_secs = timeout;
    }
    debug!("fetch settings: {fetch:?}");
    let fetcher = HttpFetcher::new(fetch.timeout());

    progress(cli, stderr, install_banner(&spec));
    let builder = EnvironmentBuilder::new(root).replace_existing(args.force);
    let outcome = Installer::new(&fetcher)
        .with_retry_policy(fetch.retry_policy())
        .install(&spec, &builder);

    if !outcome.succeeded {
        if outcome.left_incomplete {
            progress(cli, stderr, environment_left_message(&outcome));
        }
        return Err(Failure {
            kind: outcome.error_kind.unwrap_or(ErrorKind::InstallWriteFailed),
            message: failure_message(&outcome),
        });
    }
    progress(cli, stderr, success_message(&outcome));

    if let Some(test) = smoke_test {
        let env = InstallEnvironment::open(&outcome.root)?;
        run_smoke_test(cli, &env, test, config.smoke_test.timeout(), stderr)?;
    }
    Ok(())
}

fn run_test(
    cli: &Cli,
    args: &TestArgs,
    config: &InstallerConfig,
    dirs: &dyn BaseDirs,
    stderr: &mut dyn Write,
) -> RunResult {
    let spec = load_manifest(&args.manifest)?;
    let test = declared_smoke_test(&spec)?;
    let root = resolve_root(args.prefix.as_deref(), config, &spec, dirs)?;
    let env = InstallEnvironment::open(&root)?;
    let timeout = args
        .timeout
        .map_or_else(|| config.smoke_test.timeout(), Duration::from_secs);
    run_smoke_test(cli, &env, test, timeout, stderr)
}

fn run_smoke_test(
    cli: &Cli,
    env: &InstallEnvironment,
    test: &SmokeTestSpec,
    timeout: Duration,
    stderr: &mut dyn Write,
) -> RunResult {
    let report = SmokeTestRunner::new(&SystemProcessRunner)
        .with_timeout(timeout)
        .run(env, test)?;
    debug!("smoke test output:\n{}", report.output);
    progress(cli, stderr, smoke_passed_message(&report));
    Ok(())
}

fn declared_smoke_test(spec: &PackageSpec) -> Result<&SmokeTestSpec, Failure> {
    spec.test().ok_or_else(|| Failure {
        kind: ErrorKind::MalformedManifest,
        message: format!("manifest for {} declares no [test] table", spec.name()),
    })
}

/// The `--prefix` value when given, otherwise `<env_root>/<package name>`.
fn resolve_root(
    prefix: Option<&Utf8Path>,
    config: &InstallerConfig,
    spec: &PackageSpec,
    dirs: &dyn BaseDirs,
) -> Result<Utf8PathBuf, Failure> {
    match prefix {
        Some(prefix) => Ok(prefix.to_owned()),
        None => Ok(config.environment_root(spec.name(), dirs)?),
    }
}

fn progress(cli: &Cli, stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if !cli.quiet {
        write_stderr_line(stderr, message);
    }
}

fn exit_code_for_run_result(result: RunResult, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(failure) => {
            write_stderr_line(stderr, error_line(failure.kind, &failure.message));
            1
        }
    }
}
