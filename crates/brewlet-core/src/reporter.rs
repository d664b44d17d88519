//! Reporter trait for dependency injection
//!
//! Lets the pipeline report progress without being coupled to a terminal.
//! The CLI plugs in a console implementation; tests and library callers use
//! [`NullReporter`].

use std::path::Path;

use brewlet_schema::{ArtifactVariant, Checksum, PackageName, Version};

use crate::io::install::InstalledBinary;

/// Receives pipeline progress events.
pub trait Reporter: Send + Sync {
    /// A variant was chosen for the host.
    fn resolved(&self, name: &PackageName, version: &Version, variant: &ArtifactVariant);

    /// Updates the progress of a download.
    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>);

    /// A download attempt failed and another one is about to start.
    fn retrying(&self, name: &PackageName, version: &Version, attempt: u32, reason: &str);

    /// The downloaded bytes matched the expected checksum.
    fn verified(&self, name: &PackageName, version: &Version, checksum: &Checksum);

    /// The archive was unpacked into `entries` regular files.
    fn extracting(&self, name: &PackageName, version: &Version, entries: usize);

    /// The binary is being written to `target`.
    fn installing(&self, name: &PackageName, version: &Version, target: &Path);

    /// Marks a package operation as successfully completed.
    fn done(&self, name: &PackageName, version: &Version, installed: &InstalledBinary);

    /// Marks a package operation as failed with a specific reason.
    fn failed(&self, name: &PackageName, version: &Version, reason: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn resolved(&self, name: &PackageName, version: &Version, variant: &ArtifactVariant) {
        (**self).resolved(name, version, variant);
    }
    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        (**self).downloading(name, version, current, total);
    }
    fn retrying(&self, name: &PackageName, version: &Version, attempt: u32, reason: &str) {
        (**self).retrying(name, version, attempt, reason);
    }
    fn verified(&self, name: &PackageName, version: &Version, checksum: &Checksum) {
        (**self).verified(name, version, checksum);
    }
    fn extracting(&self, name: &PackageName, version: &Version, entries: usize) {
        (**self).extracting(name, version, entries);
    }
    fn installing(&self, name: &PackageName, version: &Version, target: &Path) {
        (**self).installing(name, version, target);
    }
    fn done(&self, name: &PackageName, version: &Version, installed: &InstalledBinary) {
        (**self).done(name, version, installed);
    }
    fn failed(&self, name: &PackageName, version: &Version, reason: &str) {
        (**self).failed(name, version, reason);
    }
}

/// A reporter that does nothing, useful for tests and library callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn resolved(&self, _: &PackageName, _: &Version, _: &ArtifactVariant) {}
    fn downloading(&self, _: &PackageName, _: &Version, _: u64, _: Option<u64>) {}
    fn retrying(&self, _: &PackageName, _: &Version, _: u32, _: &str) {}
    fn verified(&self, _: &PackageName, _: &Version, _: &Checksum) {}
    fn extracting(&self, _: &PackageName, _: &Version, _: usize) {}
    fn installing(&self, _: &PackageName, _: &Version, _: &Path) {}
    fn done(&self, _: &PackageName, _: &Version, _: &InstalledBinary) {}
    fn failed(&self, _: &PackageName, _: &Version, _: &str) {}
}
