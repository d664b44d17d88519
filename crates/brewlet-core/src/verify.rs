//! Checksum verification.
//!
//! Pure functions over byte slices: no network, no filesystem. The fetcher
//! hands over the downloaded bytes and the pipeline refuses to extract
//! anything that does not match.

use brewlet_schema::{Checksum, DigestAlgorithm};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Incremental hasher over one of the supported algorithms.
#[derive(Debug, Clone)]
pub enum Hasher {
    /// SHA-1 state.
    Sha1(Sha1),
    /// SHA-256 state.
    Sha256(Sha256),
}

impl Hasher {
    /// Fresh hasher for `algorithm`.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    /// Lowercase hex digest of everything fed so far.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Lowercase hex digest of `bytes`.
pub fn digest_hex(bytes: &[u8], algorithm: DigestAlgorithm) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(bytes);
    hasher.finalize_hex()
}

/// Whether `bytes` hash to `expected` under the checksum's algorithm.
pub fn verify(bytes: &[u8], expected: &Checksum) -> bool {
    expected.matches_hex(&digest_hex(bytes, expected.algorithm()))
}
