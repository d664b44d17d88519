//! brewlet - verified installs of precompiled tools
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Installs a single binary described by a formula recipe: the artifact for
//! the host architecture is downloaded, checked against the recipe checksum,
//! unpacked in memory and atomically placed in the bin directory.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.brewlet/
//! ├── bin/          # Installed binaries (default --target)
//! ├── tmp/          # Per-run working directories, removed after each run
//! ├── locks/        # Per-target install locks
//! └── config.toml   # Optional settings
//! ```

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use brewlet_core::{FailureKind, PipelineError};
use brewlet_schema::{DigestAlgorithm, FormulaError, HistoryError, HostArch};
use clap::{ArgAction, Parser, Subcommand};

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
    pub const USAGE: u8 = 2;
    pub const UNSUPPORTED_ARCHITECTURE: u8 = 10;
    pub const FETCH: u8 = 11;
    pub const INTEGRITY_MISMATCH: u8 = 12;
    pub const UNSAFE_ARCHIVE: u8 = 13;
    pub const INSTALL: u8 = 14;
}

#[derive(Debug, Parser)]
#[command(name = "brewlet")]
#[command(author, version, about = "brewlet - verified, architecture-aware tool installer")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install the binary described by a formula
    Install {
        /// Formula file, or a directory holding one file per version
        formula: PathBuf,
        /// Version to install when FORMULA is a directory (default: latest)
        #[arg(long)]
        version: Option<String>,
        /// Install for this architecture instead of the host's
        #[arg(long)]
        arch: Option<HostArch>,
        /// Directory to install into (default: ~/.brewlet/bin)
        #[arg(long)]
        target: Option<PathBuf>,
        /// Resolve the artifact and print the plan without downloading
        #[arg(long)]
        dry_run: bool,
    },
    /// Show a formula's metadata and artifacts
    Info {
        /// Formula file or directory
        formula: PathBuf,
        /// Version to show when FORMULA is a directory (default: latest)
        #[arg(long)]
        version: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the versions in a formula directory
    Versions {
        /// Directory holding one formula file per version
        dir: PathBuf,
    },
    /// Print file digests (for writing formulas)
    Hash {
        /// Digest algorithm
        #[arg(long, short, default_value = "sha1")]
        algorithm: DigestAlgorithm,
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Formula selection problems that are the caller's to fix.
#[derive(thiserror::Error, Debug)]
pub enum SelectionError {
    #[error("{name} has no version {requested} (available: {available})")]
    UnknownVersion {
        name: String,
        requested: String,
        available: String,
    },

    #[error("{path} declares version {found}, not {requested}")]
    VersionMismatch {
        path: String,
        found: String,
        requested: String,
    },
}

/// Map an error to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(pipeline) = cause.downcast_ref::<PipelineError>() {
            return match pipeline.kind() {
                FailureKind::UnsupportedArchitecture => exit::UNSUPPORTED_ARCHITECTURE,
                FailureKind::Fetch => exit::FETCH,
                FailureKind::IntegrityMismatch => exit::INTEGRITY_MISMATCH,
                FailureKind::UnsafeArchiveEntry => exit::UNSAFE_ARCHIVE,
                FailureKind::Install => exit::INSTALL,
            };
        }
        if cause.is::<FormulaError>() || cause.is::<HistoryError>() || cause.is::<SelectionError>()
        {
            return exit::USAGE;
        }
    }
    exit::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use brewlet_schema::{Arch, PackageName};

    #[test]
    fn cli_parses_install() {
        let cli = Cli::try_parse_from([
            "brewlet", "-vv", "install", "formula/pup", "--arch", "aarch64", "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Install { formula, arch, dry_run, .. } => {
                assert_eq!(formula, PathBuf::from("formula/pup"));
                assert_eq!(arch, Some(HostArch::from_raw("aarch64")));
                assert!(dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn hash_defaults_to_sha1() {
        let cli = Cli::try_parse_from(["brewlet", "hash", "a.zip"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Hash { algorithm: DigestAlgorithm::Sha1, .. }
        ));
    }

    #[test]
    fn pipeline_errors_map_to_their_codes() {
        let err = anyhow::Error::from(PipelineError::from(brewlet_core::select::SelectError {
            package: PackageName::new("pup"),
            host: HostArch::from_raw("aarch64"),
            available: vec![Arch::Amd64],
        }))
        .context("Failed to install pup");
        assert_eq!(exit_code(&err), exit::UNSUPPORTED_ARCHITECTURE);
    }

    #[test]
    fn recipe_errors_are_usage_errors() {
        let err = anyhow::Error::from(FormulaError::NoVariants);
        assert_eq!(exit_code(&err), exit::USAGE);

        let err: anyhow::Result<()> =
            Err(std::io::Error::other("disk on fire")).context("while loading settings");
        assert_eq!(exit_code(&err.unwrap_err()), exit::FAILURE);
    }
}
