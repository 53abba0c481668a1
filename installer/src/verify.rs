//! Content verification against declared digests.
//!
//! Fetched bytes must pass [`verify`] before anything derived from them is
//! written into an environment.

use crate::error::{InstallerError, Result};
use crate::manifest::digest::Digest;

/// Check that `bytes` hash to `expected` using the digest's algorithm.
///
/// The comparison examines every byte regardless of where the first
/// difference occurs.
///
/// # Errors
///
/// Returns [`InstallerError::DigestMismatch`] with both digests in hex when
/// the content does not match.
///
/// # Examples
///
/// ```
/// use pinstall::manifest::digest::DigestAlgorithm;
/// use pinstall::verify::verify;
///
/// let expected = DigestAlgorithm::Sha256.compute(b"payload");
/// assert!(verify(b"payload", &expected).is_ok());
/// assert!(verify(b"tampered", &expected).is_err());
/// ```
pub fn verify(bytes: &[u8], expected: &Digest) -> Result<()> {
    let actual = expected.algorithm().compute(bytes);
    if digests_equal(actual.as_bytes(), expected.as_bytes()) {
        return Ok(());
    }
    Err(InstallerError::DigestMismatch {
        expected: expected.to_hex(),
        actual: actual.to_hex(),
    })
}

fn digests_equal(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
