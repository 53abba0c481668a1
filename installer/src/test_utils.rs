//! Shared test utilities for the installer crate.
//!
//! Archive builders write raw tar headers so tests can produce entries that
//! the `tar` crate's own builder would refuse, such as `../escape.txt`.
#![allow(
    clippy::expect_used,
    clippy::indexing_slicing,
    reason = "fixture builders panic on failure and are only used by tests"
)]

use crate::fetch::{FetchError, FetchResult, Fetcher};
use crate::manifest::digest::DigestAlgorithm;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Write};

/// Returns the lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    DigestAlgorithm::Sha256.compute(bytes).to_hex()
}

/// An entry for the raw archive builders.
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    /// A regular file with contents.
    File(&'a str, &'a [u8]),
    /// A directory.
    Dir(&'a str),
    /// A symbolic link and its target.
    Symlink(&'a str, &'a str),
}

/// Builds an uncompressed tarball from `entries` without path validation.
pub fn tar_archive(entries: &[Entry<'_>]) -> Vec<u8> {
    let empty: &[u8] = &[];
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let (path, data, kind, link) = match *entry {
            Entry::File(path, data) => (path, data, tar::EntryType::Regular, ""),
            Entry::Dir(path) => (path, empty, tar::EntryType::Directory, ""),
            Entry::Symlink(path, target) => (path, empty, tar::EntryType::Symlink, target),
        };
        let mut header = tar::Header::new_old();
        write_raw(&mut header.as_old_mut().name, path);
        write_raw(&mut header.as_old_mut().linkname, link);
        header.set_entry_type(kind);
        header.set_mode(if kind.is_dir() { 0o755 } else { 0o644 });
        header.set_size(data.len() as u64);
        header.set_cksum();
        builder.append(&header, data).expect("append entry");
    }
    builder.into_inner().expect("finish tar")
}

fn write_raw(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    assert!(bytes.len() < field.len(), "name too long for raw header: {value}");
    field[..bytes.len()].copy_from_slice(bytes);
}

/// Builds a `.tar.gz` archive from `entries`.
pub fn tar_gz_archive(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&tar_archive(entries))
        .expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Builds a `.tar.zst` archive from `entries`.
pub fn tar_zst_archive(entries: &[Entry<'_>]) -> Vec<u8> {
    zstd::encode_all(tar_archive(entries).as_slice(), 0).expect("zstd encode")
}

/// Builds a `.zip` archive of regular files.
pub fn zip_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A [`Fetcher`] serving canned responses and recording every request.
///
/// URLs without a canned response fail with [`FetchError::NotFound`].
#[derive(Debug, Default)]
pub struct StubFetcher {
    responses: HashMap<String, Result<Vec<u8>, FetchError>>,
    calls: RefCell<Vec<String>>,
}

impl StubFetcher {
    /// Creates a fetcher with no canned responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for every request to `url`.
    #[must_use]
    pub fn serve(mut self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_owned(), Ok(bytes.into()));
        self
    }

    /// Fail every request to `url` with `err`.
    #[must_use]
    pub fn fail(mut self, url: &str, err: FetchError) -> Self {
        self.responses.insert(url.to_owned(), Err(err));
        self
    }

    /// All requested URLs in request order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Number of requests made for `url`.
    pub fn call_count(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|u| *u == url).count()
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        self.calls.borrow_mut().push(url.to_owned());
        match self.responses.get(url) {
            Some(Ok(bytes)) => Ok(FetchResult::new(bytes.clone(), url)),
            Some(Err(err)) => Err(err.clone()),
            None => Err(FetchError::NotFound {
                url: url.to_owned(),
            }),
        }
    }
}
