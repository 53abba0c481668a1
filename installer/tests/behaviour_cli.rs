//! End-to-end CLI behaviour tests for `pinstall`.
//!
//! These scenarios invoke the installer binary against manifests whose
//! artefacts live in a local `file://` mirror.

use camino::Utf8PathBuf;
use pinstall::test_utils::{Entry, sha256_hex, tar_gz_archive};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::process::{Command, Output};
use tempfile::TempDir;

#[derive(Default)]
struct CliWorld {
    mirror: RefCell<Option<Utf8PathBuf>>,
    declared_digest: RefCell<Option<String>>,
    output: RefCell<Option<Output>>,
    // Keep temp_dir alive for the lifetime of the scenario.
    _temp_dir: RefCell<Option<TempDir>>,
}

#[fixture]
fn cli_world() -> CliWorld {
    CliWorld::default()
}

fn mirror(cli_world: &CliWorld) -> Utf8PathBuf {
    cli_world.mirror.borrow().clone().expect("mirror not set")
}

/// Writes the manifest for the mirrored archive, honouring any declared
/// digest override.
fn write_manifest(cli_world: &CliWorld) -> Utf8PathBuf {
    let base = mirror(cli_world);
    let archive_path = base.join("tool-1.0.tar.gz");
    let digest = match cli_world.declared_digest.borrow().as_ref() {
        Some(digest) => digest.clone(),
        None => sha256_hex(&std::fs::read(&archive_path).expect("read mirrored archive")),
    };
    let manifest = base.join("tool.toml");
    std::fs::write(
        &manifest,
        format!(
            "name = \"tool\"\nversion = \"1.0\"\nurl = \"file://{archive_path}\"\n\
             sha256 = \"{digest}\"\n\n[test]\ncommand = \"sh\"\n\
             args = [\"libexec/tool/tool.sh\"]\n"
        ),
    )
    .expect("write manifest");
    manifest
}

fn get_output(cli_world: &CliWorld) -> std::cell::Ref<'_, Output> {
    let output = cli_world.output.borrow();
    std::cell::Ref::map(output, |opt| opt.as_ref().expect("output not set"))
}

#[given("a manifest served from a local mirror")]
fn given_local_mirror(cli_world: &CliWorld) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let base = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("utf8 temp dir");
    let archive = tar_gz_archive(&[
        Entry::Dir("tool-1.0/"),
        Entry::File("tool-1.0/tool.sh", b"echo tool works\n"),
    ]);
    std::fs::write(base.join("tool-1.0.tar.gz"), archive).expect("write archive");
    std::fs::write(base.join("config.toml"), "").expect("write config");
    cli_world.mirror.replace(Some(base));
    cli_world._temp_dir.replace(Some(temp_dir));
}

#[given("the manifest declares a wrong digest")]
fn given_wrong_digest(cli_world: &CliWorld) {
    cli_world
        .declared_digest
        .replace(Some(sha256_hex(b"a different archive")));
}

#[when("pinstall is run with \"{args}\"")]
fn when_pinstall_run(cli_world: &CliWorld, args: String) {
    let manifest = write_manifest(cli_world);
    let base = mirror(cli_world);
    let mut words = args.split_whitespace();
    let subcommand = words.next().expect("subcommand given");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pinstall"));
    cmd.arg(subcommand)
        .arg(manifest.as_str())
        .args(words)
        .args(["--prefix", base.join("env").as_str()])
        .env("PINSTALL_CONFIG", base.join("config.toml").as_str())
        .env_remove("PINSTALL_LOG")
        .current_dir(&base);

    let output = cmd.output().expect("failed to run pinstall");
    cli_world.output.replace(Some(output));
}

#[then("pinstall exits successfully")]
fn then_exits_successfully(cli_world: &CliWorld) {
    let output = get_output(cli_world);
    assert!(
        output.status.success(),
        "expected success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[then("pinstall exits with an error")]
fn then_exits_with_error(cli_world: &CliWorld) {
    let output = get_output(cli_world);
    assert_eq!(
        output.status.code(),
        Some(1),
        "expected failure, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[then("stderr contains \"{text}\"")]
fn then_stderr_contains(cli_world: &CliWorld, text: String) {
    let output = get_output(cli_world);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&text), "unexpected stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

// Do not reorder scenarios in tests/features/cli.feature; bindings are
// index-based.
#[scenario(path = "tests/features/cli.feature", index = 0)]
fn scenario_install_and_smoke_test(cli_world: CliWorld) {
    let _ = cli_world;
}

#[scenario(path = "tests/features/cli.feature", index = 1)]
fn scenario_digest_mismatch_reported(cli_world: CliWorld) {
    let _ = cli_world;
}

#[scenario(path = "tests/features/cli.feature", index = 2)]
fn scenario_refuse_without_force(cli_world: CliWorld) {
    let _ = cli_world;
}

#[scenario(path = "tests/features/cli.feature", index = 3)]
fn scenario_replace_with_force(cli_world: CliWorld) {
    let _ = cli_world;
}

#[scenario(path = "tests/features/cli.feature", index = 4)]
fn scenario_test_without_install(cli_world: CliWorld) {
    let _ = cli_world;
}
