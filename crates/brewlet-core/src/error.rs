//! Pipeline errors.

use brewlet_schema::{DigestAlgorithm, PackageName, Version};
use thiserror::Error;

use crate::io::download::FetchError;
use crate::io::extract::ExtractError;
use crate::io::install::InstallError;
use crate::pipeline::Stage;
use crate::select::SelectError;

/// Coarse failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No variant for the host architecture
    UnsupportedArchitecture,
    /// Artifact could not be downloaded
    Fetch,
    /// Downloaded bytes do not match the recipe checksum
    IntegrityMismatch,
    /// Archive is malicious or unreadable
    UnsafeArchiveEntry,
    /// Binary could not be placed
    Install,
}

impl FailureKind {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedArchitecture => "unsupported architecture",
            Self::Fetch => "fetch error",
            Self::IntegrityMismatch => "integrity mismatch",
            Self::UnsafeArchiveEntry => "unsafe archive entry",
            Self::Install => "install error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an install run stopped.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No variant runs on the host.
    #[error(transparent)]
    UnsupportedArchitecture(#[from] SelectError),

    /// The artifact could not be downloaded.
    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    /// The downloaded bytes do not hash to the recipe checksum.
    #[error(
        "Checksum mismatch for {package}@{version} from {url}: expected {algorithm}:{expected}, got {algorithm}:{actual}"
    )]
    IntegrityMismatch {
        /// Package being installed.
        package: PackageName,
        /// Package version.
        version: Version,
        /// Where the bytes came from.
        url: String,
        /// Algorithm of the recipe checksum.
        algorithm: DigestAlgorithm,
        /// Digest recorded in the recipe.
        expected: String,
        /// Digest of the downloaded bytes.
        actual: String,
    },

    /// The archive could not be trusted to yield the binary.
    #[error("Archive rejected: {0}")]
    UnsafeArchive(#[from] ExtractError),

    /// The binary could not be placed at the target.
    #[error("Install failed: {0}")]
    Install(#[from] InstallError),
}

impl PipelineError {
    /// Failure class for callers and exit codes.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnsupportedArchitecture(_) => FailureKind::UnsupportedArchitecture,
            Self::Fetch(_) => FailureKind::Fetch,
            Self::IntegrityMismatch { .. } => FailureKind::IntegrityMismatch,
            Self::UnsafeArchive(_) => FailureKind::UnsafeArchiveEntry,
            Self::Install(_) => FailureKind::Install,
        }
    }

    /// Stage the run was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::UnsupportedArchitecture(_) => Stage::Resolved,
            Self::Fetch(_) => Stage::Fetched,
            Self::IntegrityMismatch { .. } => Stage::Verified,
            Self::UnsafeArchive(_) => Stage::Extracted,
            Self::Install(_) => Stage::Installed,
        }
    }
}
