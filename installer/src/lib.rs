//! pinstall library.
//!
//! A declarative package installer with pinned dependency verification. A
//! manifest names a primary source archive and an ordered list of resource
//! archives, each pinned by content digest; the installer fetches, verifies
//! and unpacks every artefact into an isolated environment directory, then
//! optionally runs a smoke test against the result. It is used by the
//! `pinstall` CLI binary and can be consumed programmatically.
//!
//! # Modules
//!
//! - [`cancel`] - Cooperative cancellation of install runs
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - TOML configuration for retries, timeouts and roots
//! - [`dirs`] - Platform directory resolution
//! - [`environment`] - Isolated environments, archive extraction and receipts
//! - [`error`] - Error types and the stable error classification
//! - [`fetch`] - Artefact retrieval with retry and backoff
//! - [`manifest`] - Manifest parsing and the validated package model
//! - [`orchestrator`] - The install state machine
//! - [`output`] - CLI message formatting
//! - [`smoke`] - Smoke tests against installed environments
//! - [`verify`] - Digest verification of fetched content

pub mod cancel;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod orchestrator;
pub mod output;
pub mod smoke;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
