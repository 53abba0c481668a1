//! Content digests declared by manifests.
//!
//! A digest pairs a hash algorithm with its raw output. Manifests declare
//! digests as hex strings under a key named for the algorithm; parsing
//! validates that the hex decodes to exactly the algorithm's output length.

use sha2::{Digest as _, Sha256, Sha512};
use std::fmt;

/// Hash algorithms a manifest may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// SHA-256, 32-byte output.
    Sha256,
    /// SHA-512, 64-byte output.
    Sha512,
}

impl DigestAlgorithm {
    /// Length of this algorithm's output in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    /// The manifest key that declares a digest of this algorithm.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Hash `bytes` with this algorithm.
    #[must_use]
    pub fn compute(self, bytes: &[u8]) -> Digest {
        let output = match self {
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
            Self::Sha512 => Sha512::digest(bytes).to_vec(),
        };
        Digest {
            algorithm: self,
            bytes: output,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A validated digest: algorithm plus raw output bytes.
///
/// # Examples
///
/// ```
/// use pinstall::manifest::digest::{Digest, DigestAlgorithm};
///
/// let hex = "ab".repeat(32);
/// let digest = Digest::from_hex(DigestAlgorithm::Sha256, &hex).unwrap();
/// assert_eq!(digest.as_bytes().len(), 32);
/// assert_eq!(digest.to_hex(), hex);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
}

impl Digest {
    /// Parse a hex-encoded digest for `algorithm`.
    ///
    /// Upper- and lowercase hex are both accepted.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the value is not hex or does
    /// not decode to the algorithm's output length.
    pub fn from_hex(algorithm: DigestAlgorithm, value: &str) -> Result<Self, String> {
        let expected_chars = algorithm.output_len() * 2;
        if value.len() != expected_chars {
            return Err(format!(
                "expected {expected_chars} hex characters for {algorithm}, got {}",
                value.len()
            ));
        }
        let bytes = hex::decode(value).map_err(|err| err.to_string())?;
        Ok(Self { algorithm, bytes })
    }

    /// The algorithm this digest was produced with.
    #[must_use]
    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex rendering of the digest.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}
