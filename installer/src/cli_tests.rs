//! Tests for CLI parsing and default behaviours.

use super::*;
use rstest::rstest;

#[test]
fn install_parses_defaults() {
    let cli = Cli::parse_from(["pinstall", "install", "okta_aws.toml"]);
    let Command::Install(args) = cli.command else {
        panic!("expected Install command");
    };
    assert_eq!(args.manifest, Utf8PathBuf::from("okta_aws.toml"));
    assert!(args.prefix.is_none());
    assert!(!args.force);
    assert!(args.retries.is_none());
    assert!(args.fetch_timeout.is_none());
    assert!(!args.run_test);
    assert!(cli.config.is_none());
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
}

#[test]
fn install_parses_all_flags() {
    let cli = Cli::parse_from([
        "pinstall",
        "install",
        "pkg.json",
        "--prefix",
        "/tmp/env",
        "--force",
        "--retries",
        "5",
        "--fetch-timeout",
        "10",
        "--run-test",
    ]);
    let Command::Install(args) = cli.command else {
        panic!("expected Install command");
    };
    assert_eq!(args.prefix, Some(Utf8PathBuf::from("/tmp/env")));
    assert!(args.force);
    assert_eq!(args.retries, Some(5));
    assert_eq!(args.fetch_timeout, Some(10));
    assert!(args.run_test);
}

#[test]
fn test_parses_prefix_and_timeout() {
    let cli = Cli::parse_from(["pinstall", "test", "pkg.toml", "-p", "env", "--timeout", "5"]);
    let Command::Test(args) = cli.command else {
        panic!("expected Test command");
    };
    assert_eq!(args.prefix, Some(Utf8PathBuf::from("env")));
    assert_eq!(args.timeout, Some(5));
}

#[test]
fn global_flags_follow_subcommand() {
    let cli = Cli::parse_from(["pinstall", "install", "m.toml", "--config", "c.toml", "-v"]);
    assert_eq!(cli.config, Some(Utf8PathBuf::from("c.toml")));
    assert_eq!(cli.verbosity, 1);
}

#[rstest]
#[case::missing_manifest(&["pinstall", "install"][..])]
#[case::missing_subcommand(&["pinstall"][..])]
#[case::zero_timeout(&["pinstall", "test", "m.toml", "--timeout", "0"][..])]
#[case::verbose_and_quiet(&["pinstall", "-v", "-q", "install", "m.toml"][..])]
fn rejects_invalid_invocations(#[case] args: &[&str]) {
    assert!(Cli::try_parse_from(args).is_err());
}

#[rstest]
#[case::default(&["pinstall", "test", "m.toml"][..], log::LevelFilter::Warn)]
#[case::verbose(&["pinstall", "-v", "test", "m.toml"][..], log::LevelFilter::Info)]
#[case::very_verbose(&["pinstall", "-vvv", "test", "m.toml"][..], log::LevelFilter::Trace)]
#[case::quiet(&["pinstall", "-q", "test", "m.toml"][..], log::LevelFilter::Error)]
fn log_level_follows_verbosity(#[case] args: &[&str], #[case] expected: log::LevelFilter) {
    assert_eq!(Cli::parse_from(args).log_level(), expected);
}
