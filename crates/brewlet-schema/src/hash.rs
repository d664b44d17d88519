//! Recipe checksums.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Digest algorithm a formula checksum was recorded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-1 (the algorithm the upstream recipes use).
    Sha1,
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Number of hex characters in a digest of this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    /// Lowercase algorithm name, also used as the recipe field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            _ => Err(format!("Unknown digest algorithm: {s}")),
        }
    }
}

/// Errors raised when a checksum string is not a well-formed digest.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChecksumError {
    /// Wrong number of hex characters for the algorithm.
    #[error("Invalid {algorithm} checksum: expected {expected} hex characters, got {actual}")]
    InvalidLength {
        /// Algorithm the checksum was declared with.
        algorithm: DigestAlgorithm,
        /// Required length.
        expected: usize,
        /// Length found.
        actual: usize,
    },

    /// The string contains characters outside `[0-9a-fA-F]`.
    #[error("Invalid {algorithm} checksum: contains non-hex characters in '{value}'")]
    NonHex {
        /// Algorithm the checksum was declared with.
        algorithm: DigestAlgorithm,
        /// The offending value.
        value: String,
    },
}

/// A validated, lowercase hex digest together with its algorithm.
///
/// Validation happens at construction, so every `Checksum` in the system is
/// known to have the right length and alphabet for its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Checksum {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl Checksum {
    /// Create a new checksum, validating and lowercasing the hex string.
    ///
    /// Accepts strings with or without an `<algorithm>:` prefix.
    pub fn new(algorithm: DigestAlgorithm, s: &str) -> Result<Self, ChecksumError> {
        let prefix = format!("{}:", algorithm.as_str());
        let hex = s.trim().strip_prefix(prefix.as_str()).unwrap_or(s.trim());

        if hex.len() != algorithm.hex_len() {
            return Err(ChecksumError::InvalidLength {
                algorithm,
                expected: algorithm.hex_len(),
                actual: hex.len(),
            });
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChecksumError::NonHex {
                algorithm,
                value: s.to_string(),
            });
        }

        Ok(Self {
            algorithm,
            hex: hex.to_lowercase(),
        })
    }

    /// Shorthand for a SHA-1 checksum.
    pub fn sha1(s: &str) -> Result<Self, ChecksumError> {
        Self::new(DigestAlgorithm::Sha1, s)
    }

    /// Shorthand for a SHA-256 checksum.
    pub fn sha256(s: &str) -> Result<Self, ChecksumError> {
        Self::new(DigestAlgorithm::Sha256, s)
    }

    /// Algorithm this digest was produced with.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The lowercase hex digest.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Case-insensitive comparison against a hex digest of the same algorithm.
    pub fn matches_hex(&self, actual: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual)
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.hex
    }
}
