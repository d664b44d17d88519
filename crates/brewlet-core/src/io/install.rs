//! Binary placement.
//!
//! The binary is written to a temporary file in the destination directory,
//! flushed to disk, marked executable and renamed over the target. A reader
//! of the target path sees either the previous binary or the new one.

use std::io::Write;
use std::path::{Path, PathBuf};

use brewlet_schema::DigestAlgorithm;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::verify::digest_hex;

/// A filesystem step of the install failed.
#[derive(Error, Debug)]
#[error("Failed to {operation} {}: {source}", .path.display())]
pub struct InstallError {
    /// Path the step operated on.
    pub path: PathBuf,
    /// What was being done, e.g. `rename into place`.
    pub operation: &'static str,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

impl InstallError {
    fn new(path: &Path, operation: &'static str, source: std::io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            operation,
            source,
        }
    }
}

/// An installed executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBinary {
    /// Final location of the binary
    pub path: PathBuf,
    /// SHA-256 of the bytes written
    pub sha256: String,
    /// Size in bytes
    pub size: u64,
}

/// Atomically place `contents` at `target` with mode `0o755`.
///
/// Creates the parent directory if needed. On failure the temporary file is
/// removed and whatever was at `target` before is left alone.
pub fn install(contents: &[u8], target: &Path) -> Result<InstalledBinary, InstallError> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(parent)
        .map_err(|e| InstallError::new(parent, "create directory", e))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| InstallError::new(parent, "create temporary file in", e))?;

    tmp.write_all(contents)
        .map_err(|e| InstallError::new(tmp.path(), "write", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| InstallError::new(tmp.path(), "sync", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o755))
            .map_err(|e| InstallError::new(tmp.path(), "set permissions on", e))?;
    }

    tmp.persist(target)
        .map_err(|e| InstallError::new(target, "rename into place", e.error))?;

    sync_dir(parent);

    let installed = InstalledBinary {
        path: target.to_path_buf(),
        sha256: digest_hex(contents, DigestAlgorithm::Sha256),
        size: contents.len() as u64,
    };
    tracing::debug!(path = %installed.path.display(), size = installed.size, "binary installed");
    Ok(installed)
}

/// Persist the rename itself. Failure here does not undo the install.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = std::fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(path = %dir.display(), error = %e, "directory sync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
