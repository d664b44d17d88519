//! Per-target advisory locks.
//!
//! Two installs writing the same binary path take turns; installs to
//! different paths never contend. Lock files live in their own directory so
//! the install directory only ever contains binaries.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use brewlet_schema::DigestAlgorithm;
use fs4::fs_std::FileExt;

use crate::io::install::InstallError;
use crate::verify::digest_hex;

/// Exclusive lock on one install target. Released on drop.
#[derive(Debug)]
pub struct TargetLock {
    file: File,
    path: PathBuf,
}

impl TargetLock {
    /// Lock file path guarding `target`.
    ///
    /// The key is the target's canonical location, so every spelling of one
    /// file maps to one lock. The target's parent directory is created if it
    /// does not exist yet.
    pub fn path_for(lock_dir: &Path, target: &Path) -> Result<PathBuf, InstallError> {
        let canonical = canonical_target(target).map_err(|source| InstallError {
            path: target.to_path_buf(),
            operation: "resolve target",
            source,
        })?;
        let key = digest_hex(canonical.as_os_str().as_encoded_bytes(), DigestAlgorithm::Sha256);
        Ok(lock_dir.join(format!("{}.lock", &key[..32])))
    }

    /// Block until the lock for `target` is held.
    pub fn acquire(lock_dir: &Path, target: &Path) -> Result<Self, InstallError> {
        let err = |path: &Path, operation, source| InstallError {
            path: path.to_path_buf(),
            operation,
            source,
        };

        std::fs::create_dir_all(lock_dir).map_err(|e| err(lock_dir, "create lock directory", e))?;

        let path = Self::path_for(lock_dir, target)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| err(&path, "open lock file", e))?;

        FileExt::lock_exclusive(&file).map_err(|e| err(&path, "lock", e))?;
        tracing::debug!(lock = %path.display(), target = %target.display(), "target lock acquired");

        Ok(Self { file, path })
    }

    /// Async wrapper running the blocking acquire on the blocking pool.
    pub async fn acquire_async(lock_dir: PathBuf, target: PathBuf) -> Result<Self, InstallError> {
        let join = tokio::task::spawn_blocking({
            let target = target.clone();
            move || Self::acquire(&lock_dir, &target)
        })
        .await;

        match join {
            Ok(result) => result,
            Err(e) => Err(InstallError {
                path: target,
                operation: "lock",
                source: std::io::Error::other(e),
            }),
        }
    }

    /// Path of the underlying lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn canonical_target(target: &Path) -> std::io::Result<PathBuf> {
    let Some(name) = target.file_name() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "target has no file name",
        ));
    };
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    Ok(std::fs::canonicalize(parent)?.join(name))
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!(lock = %self.path.display(), error = %e, "failed to release target lock");
        }
    }
}
