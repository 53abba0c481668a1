//! CLI argument definitions for pinstall.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Install packages with pinned, verified dependencies.
#[derive(Parser, Debug)]
#[command(name = "pinstall")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install packages with pinned, verified dependencies.\n\n",
    "A manifest names a primary source archive and an ordered list of resource ",
    "archives, each with a content digest. pinstall downloads every artefact, ",
    "verifies its digest and unpacks it into an isolated environment directory. ",
    "A run stops at the first failure and records the failure in the ",
    "environment's receipt, so a partial environment is never mistaken for a ",
    "working one.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Install into the default environment root:\n",
    "    $ pinstall install okta_aws.toml\n\n",
    "  Install into a chosen directory, replacing what is there, then test:\n",
    "    $ pinstall install okta_aws.toml --prefix ./env --force --run-test\n\n",
    "  Re-run the smoke test of an existing environment:\n",
    "    $ pinstall test okta_aws.toml --prefix ./env\n",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file [default: $PINSTALL_CONFIG, then platform config dir].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Install a package and its resources into an environment.
    Install(InstallArgs),

    /// Run a manifest's smoke test against an installed environment.
    Test(TestArgs),
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone)]
pub struct InstallArgs {
    /// Path to the package manifest (.toml or .json).
    #[arg(value_name = "MANIFEST")]
    pub manifest: Utf8PathBuf,

    /// Environment directory [default: <env_root>/<package name>].
    #[arg(short, long, value_name = "DIR")]
    pub prefix: Option<Utf8PathBuf>,

    /// Replace an existing non-empty environment directory.
    #[arg(long)]
    pub force: bool,

    /// Retries allowed after each failed download attempt.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Timeout for each download attempt, in seconds.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub fetch_timeout: Option<u64>,

    /// Run the manifest's smoke test after a successful install.
    #[arg(long)]
    pub run_test: bool,
}

/// Arguments for the test command.
#[derive(Parser, Debug, Clone)]
pub struct TestArgs {
    /// Path to the package manifest (.toml or .json).
    #[arg(value_name = "MANIFEST")]
    pub manifest: Utf8PathBuf,

    /// Environment directory [default: <env_root>/<package name>].
    #[arg(short, long, value_name = "DIR")]
    pub prefix: Option<Utf8PathBuf>,

    /// Smoke test timeout, in seconds.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

impl Cli {
    /// The log level filter implied by `-v`/`-q`.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use pinstall::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["pinstall", "-vv", "test", "m.toml"]);
    /// assert_eq!(cli.log_level(), log::LevelFilter::Debug);
    /// ```
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
