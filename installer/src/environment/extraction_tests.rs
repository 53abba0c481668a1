//! Unit tests for archive extraction.

use super::*;
use crate::test_utils::{Entry, tar_gz_archive, tar_zst_archive, zip_archive};
use rstest::rstest;

fn dest() -> (tempfile::TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let dest = temp_dir.path().join("out");
    fs::create_dir_all(&dest).expect("create dest");
    (temp_dir, dest)
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).expect("read dir").next().is_none()
}

#[rstest]
#[case::tar_gz("pkg-1.0.tar.gz", ArchiveFormat::TarGz)]
#[case::tgz("PKG.TGZ", ArchiveFormat::TarGz)]
#[case::tar_zst("lints.tar.zst", ArchiveFormat::TarZst)]
#[case::tar("bundle.tar", ArchiveFormat::Tar)]
#[case::zip("src.zip", ArchiveFormat::Zip)]
#[case::wheel("requests-2.13.0-py2.py3-none-any.whl", ArchiveFormat::Zip)]
#[case::plain("okta_aws", ArchiveFormat::Plain)]
fn detects_format_from_suffix(#[case] name: &str, #[case] expected: ArchiveFormat) {
    assert_eq!(ArchiveFormat::detect(name), expected);
}

#[test]
fn extracts_nested_tar_gz() {
    let (_temp, dest) = dest();
    let bytes = tar_gz_archive(&[
        Entry::Dir("pkg-1.0/"),
        Entry::File("pkg-1.0/setup.py", b"setup()"),
        Entry::File("pkg-1.0/pkg/deep/module.py", b"x = 1"),
    ]);

    let files = unpack(&bytes, ArchiveFormat::TarGz, &dest).expect("extract");
    assert_eq!(files.len(), 3);
    assert_eq!(
        fs::read(dest.join("pkg-1.0/pkg/deep/module.py")).expect("read"),
        b"x = 1"
    );
}

#[test]
fn extracts_tar_zst() {
    let (_temp, dest) = dest();
    let bytes = tar_zst_archive(&[Entry::File("hello.txt", b"hello world")]);

    let files = unpack(&bytes, ArchiveFormat::TarZst, &dest).expect("extract");
    assert_eq!(files, vec!["hello.txt"]);
    assert!(dest.join("hello.txt").exists());
}

#[test]
fn extracts_zip() {
    let (_temp, dest) = dest();
    let bytes = zip_archive(&[("lib/a.py", b"a"), ("lib/b.py", b"b")]);

    let files = unpack(&bytes, ArchiveFormat::Zip, &dest).expect("extract");
    assert_eq!(files, vec!["lib/a.py", "lib/b.py"]);
    assert_eq!(fs::read(dest.join("lib/b.py")).expect("read"), b"b");
}

#[test]
fn resolves_harmless_parent_components() {
    let (_temp, dest) = dest();
    let bytes = tar_gz_archive(&[Entry::File("a/../b.txt", b"b")]);

    unpack(&bytes, ArchiveFormat::TarGz, &dest).expect("extract");
    assert!(dest.join("b.txt").exists());
}

#[rstest]
#[case::parent_dir("../escape.txt")]
#[case::nested_parent("foo/../../escape.txt")]
#[case::absolute("/etc/passwd")]
fn rejects_traversal_before_writing_anything(#[case] bad_path: &str) {
    let (_temp, dest) = dest();
    let bytes = tar_gz_archive(&[
        Entry::File("good.txt", b"fine"),
        Entry::File(bad_path, b"evil"),
    ]);

    let err = unpack(&bytes, ArchiveFormat::TarGz, &dest).expect_err("unsafe entry");
    assert!(
        matches!(err, ExtractionError::PathTraversal { .. }),
        "expected PathTraversal for {bad_path}, got {err:?}"
    );
    assert!(err.is_unsafe_entry());
    assert!(is_empty_dir(&dest), "no files may be written");
}

#[rstest]
#[case::escaping_relative("link", "../../outside")]
#[case::absolute("link", "/etc")]
#[case::nested_escape("dir/link", "../../x")]
fn rejects_links_escaping_destination(#[case] path: &str, #[case] target: &str) {
    let (_temp, dest) = dest();
    let bytes = tar_gz_archive(&[Entry::Symlink(path, target)]);

    let err = unpack(&bytes, ArchiveFormat::TarGz, &dest).expect_err("unsafe link");
    assert!(matches!(err, ExtractionError::UnsafeLink { .. }), "got {err:?}");
    assert!(is_empty_dir(&dest));
}

#[test]
fn accepts_links_within_destination() {
    let bytes = tar_gz_archive(&[
        Entry::File("lib/real.so", b"elf"),
        Entry::Symlink("lib/alias.so", "real.so"),
        Entry::Symlink("dir/up", "../lib"),
    ]);
    let archive = tar::Archive::new(tar_reader(&bytes, ArchiveFormat::TarGz).expect("reader"));
    assert!(validate_tar(archive).is_ok());
}

#[test]
fn rejects_entries_written_through_chained_links() {
    let (_temp, dest) = dest();
    let bytes = tar_gz_archive(&[
        Entry::Symlink("d1/d2/d3/d4/d5/l1", "../../../.."),
        Entry::Symlink("d1/d2/d3/d4/d5/l1/l2", "../../../../.."),
        Entry::File("d1/d2/d3/d4/d5/l1/l2/pwned.txt", b"pwned"),
    ]);

    let err = unpack(&bytes, ArchiveFormat::TarGz, &dest).expect_err("chained links");
    assert!(matches!(err, ExtractionError::ThroughLink { .. }), "got {err:?}");
    assert!(err.is_unsafe_entry());
    assert!(is_empty_dir(&dest));
}

#[rstest]
#[case::file_below_link("lib/alias/evil.txt")]
#[case::file_replacing_link("lib/alias")]
fn rejects_entries_under_an_earlier_link(#[case] path: &str) {
    let (_temp, dest) = dest();
    let bytes = tar_gz_archive(&[
        Entry::Dir("lib/real/"),
        Entry::Symlink("lib/alias", "real"),
        Entry::File(path, b"data"),
    ]);

    let err = unpack(&bytes, ArchiveFormat::TarGz, &dest).expect_err("through link");
    assert!(matches!(err, ExtractionError::ThroughLink { .. }), "got {err:?}");
    assert!(is_empty_dir(&dest));
}

#[test]
fn rejects_link_targets_that_step_back_out_of_a_link() {
    // `s` points at the root, so `s/..` leaves the destination even though
    // the target is lexically inside.
    let (_temp, dest) = dest();
    let bytes = tar_gz_archive(&[
        Entry::Symlink("a/b/c/s", "../../.."),
        Entry::Symlink("t", "a/b/c/s/../escape"),
    ]);

    let err = unpack(&bytes, ArchiveFormat::TarGz, &dest).expect_err("through link");
    assert!(matches!(err, ExtractionError::ThroughLink { .. }), "got {err:?}");
}

#[test]
fn accepts_link_to_link() {
    let bytes = tar_gz_archive(&[
        Entry::File("lib/libz.so.1.3", b"elf"),
        Entry::Symlink("lib/libz.so.1", "libz.so.1.3"),
        Entry::Symlink("lib/libz.so", "libz.so.1"),
    ]);
    let archive = tar::Archive::new(tar_reader(&bytes, ArchiveFormat::TarGz).expect("reader"));
    assert!(validate_tar(archive).is_ok());
}

#[test]
fn rejects_zip_traversal() {
    let (_temp, dest) = dest();
    let bytes = zip_archive(&[("ok.txt", b"ok"), ("../../evil.txt", b"evil")]);

    let err = unpack(&bytes, ArchiveFormat::Zip, &dest).expect_err("unsafe entry");
    assert!(matches!(err, ExtractionError::PathTraversal { .. }));
    assert!(is_empty_dir(&dest));
}

#[test]
fn empty_archive_is_rejected() {
    let (_temp, dest) = dest();
    let bytes = tar_gz_archive(&[]);

    let err = unpack(&bytes, ArchiveFormat::TarGz, &dest).expect_err("empty");
    assert!(matches!(err, ExtractionError::EmptyArchive));
}

#[test]
fn plain_content_is_not_unpacked() {
    let (_temp, dest) = dest();
    let err = unpack(b"#!/bin/sh", ArchiveFormat::Plain, &dest).expect_err("plain");
    assert!(matches!(err, ExtractionError::NotAnArchive));
}

#[test]
fn corrupt_gzip_is_an_io_error() {
    let (_temp, dest) = dest();
    let err = unpack(b"definitely not gzip", ArchiveFormat::TarGz, &dest).expect_err("corrupt");
    assert!(!err.is_unsafe_entry());
}
