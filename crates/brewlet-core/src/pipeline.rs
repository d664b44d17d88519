//! Install pipeline using the typestate pattern.
//!
//! A run moves through a fixed sequence of states:
//!
//! ```text
//! Idle -> Resolved -> Fetched -> Verified -> Extracted -> Installed
//! ```
//!
//! Each transition consumes the previous state and state fields are private,
//! so a later stage cannot be reached without passing through every earlier
//! one. In particular, [`Verified`] is the only way to reach extraction. The
//! first error ends the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use brewlet_schema::{ArtifactVariant, HostArch, PackageDescriptor};
use bytes::Bytes;
use tempfile::TempDir;

use crate::config::Settings;
use crate::error::PipelineError;
use crate::io::download::{DownloadRequest, FetchError, Fetcher};
use crate::io::extract::{self, ArchiveEntry};
use crate::io::install::{self, InstallError, InstalledBinary};
use crate::io::lock::TargetLock;
use crate::reporter::Reporter;
use crate::select::select;
use crate::verify::{digest_hex, verify};

/// Pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Nothing has happened yet.
    Idle,
    /// A variant was selected for the host.
    Resolved,
    /// The artifact was downloaded.
    Fetched,
    /// The artifact matched its checksum.
    Verified,
    /// The binary was found in the artifact.
    Extracted,
    /// The binary is at its target path.
    Installed,
}

impl Stage {
    /// Short name used in logs and error output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolved => "resolve",
            Self::Fetched => "fetch",
            Self::Verified => "verify",
            Self::Extracted => "extract",
            Self::Installed => "install",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downloaded, not yet verified artifact.
#[derive(Debug)]
pub struct FetchedArtifact {
    /// Response body
    pub bytes: Bytes,
    /// Copy on disk inside the run's working directory
    pub path: PathBuf,
    /// Variant the artifact was fetched for
    pub variant: ArtifactVariant,
}

/// State 1: the variant for the host has been chosen.
///
/// Produced by [`Pipeline::plan`]. No network or filesystem work has happened.
#[derive(Debug)]
pub struct Resolved<'d> {
    descriptor: &'d PackageDescriptor,
    variant: &'d ArtifactVariant,
    target: PathBuf,
}

/// State 2: the artifact bytes are in memory, trust not yet established.
#[derive(Debug)]
pub struct Fetched<'d> {
    resolved: Resolved<'d>,
    artifact: FetchedArtifact,
    workdir: TempDir,
}

/// State 3: the artifact matches the recipe checksum.
#[derive(Debug)]
pub struct Verified<'d> {
    fetched: Fetched<'d>,
}

/// State 4: the binary has been located inside the artifact.
#[derive(Debug)]
pub struct Extracted<'d> {
    resolved: Resolved<'d>,
    binary: ArchiveEntry,
    _workdir: TempDir,
}

impl<'d> Resolved<'d> {
    /// Descriptor being installed.
    pub fn descriptor(&self) -> &'d PackageDescriptor {
        self.descriptor
    }

    /// Variant chosen for the host.
    pub fn variant(&self) -> &'d ArtifactVariant {
        self.variant
    }

    /// Where the binary will be written.
    pub fn target(&self) -> &Path {
        &self.target
    }

    async fn fetch(self, pipeline: &Pipeline) -> Result<Fetched<'d>, PipelineError> {
        let workdir = pipeline.workdir().await?;
        let path = workdir.path().join(artifact_file_name(self.variant.url()));

        let bytes = pipeline
            .fetcher
            .fetch(&DownloadRequest {
                url: self.variant.url(),
                dest: &path,
                pkg_name: self.descriptor.name(),
                version: self.descriptor.version(),
                reporter: &*pipeline.reporter,
            })
            .await?;

        tracing::info!(url = %self.variant.url(), bytes = bytes.len(), "artifact fetched");

        let artifact = FetchedArtifact {
            bytes,
            path,
            variant: self.variant.clone(),
        };
        Ok(Fetched {
            resolved: self,
            artifact,
            workdir,
        })
    }
}

impl<'d> Fetched<'d> {
    /// The downloaded artifact.
    pub fn artifact(&self) -> &FetchedArtifact {
        &self.artifact
    }

    fn verify(self, reporter: &dyn Reporter) -> Result<Verified<'d>, PipelineError> {
        let variant = self.resolved.variant;
        let expected = variant.checksum();

        if !verify(&self.artifact.bytes, expected) {
            let actual = digest_hex(&self.artifact.bytes, expected.algorithm());
            tracing::debug!(
                url = %variant.url(),
                %expected,
                %actual,
                "checksum mismatch"
            );
            return Err(PipelineError::IntegrityMismatch {
                package: self.resolved.descriptor.name().clone(),
                version: self.resolved.descriptor.version().clone(),
                url: variant.url().to_string(),
                algorithm: expected.algorithm(),
                expected: expected.as_str().to_string(),
                actual,
            });
        }

        tracing::debug!(checksum = %expected, "checksum verified");
        let descriptor = self.resolved.descriptor;
        reporter.verified(descriptor.name(), descriptor.version(), expected);
        Ok(Verified { fetched: self })
    }
}

impl<'d> Verified<'d> {
    fn extract(self, reporter: &dyn Reporter) -> Result<Extracted<'d>, PipelineError> {
        let Fetched {
            resolved,
            artifact,
            workdir,
        } = self.fetched;
        let descriptor = resolved.descriptor;

        let mut entries =
            extract::extract(&artifact.bytes, artifact.variant.format(), descriptor.bin())?;
        reporter.extracting(descriptor.name(), descriptor.version(), entries.len());

        let index = extract::locate(&entries, descriptor.bin())?;
        let binary = entries.swap_remove(index);
        tracing::debug!(entry = %binary.relative_path.display(), "binary located");

        Ok(Extracted {
            resolved,
            binary,
            _workdir: workdir,
        })
    }
}

impl Extracted<'_> {
    async fn install(self, pipeline: &Pipeline) -> Result<InstalledBinary, PipelineError> {
        let descriptor = self.resolved.descriptor;
        let target = self.resolved.target;
        pipeline
            .reporter
            .installing(descriptor.name(), descriptor.version(), &target);

        let _lock = TargetLock::acquire_async(pipeline.lock_dir.clone(), target.clone()).await?;

        let contents = self.binary.contents;
        let join = tokio::task::spawn_blocking({
            let target = target.clone();
            move || install::install(&contents, &target)
        })
        .await;

        let installed = match join {
            Ok(result) => result?,
            Err(e) => {
                return Err(InstallError {
                    path: target,
                    operation: "install",
                    source: std::io::Error::other(e),
                }
                .into());
            }
        };

        tracing::info!(path = %installed.path.display(), "installed");
        Ok(installed)
    }
}

/// Runs descriptors through the install stages.
pub struct Pipeline {
    fetcher: Fetcher,
    tmp_dir: PathBuf,
    lock_dir: PathBuf,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("fetcher", &self.fetcher)
            .field("tmp_dir", &self.tmp_dir)
            .field("lock_dir", &self.lock_dir)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Build a pipeline from resolved settings.
    pub fn new(settings: &Settings, reporter: Arc<dyn Reporter>) -> Result<Self, reqwest::Error> {
        let fetcher = Fetcher::new(settings.fetch.clone())?;
        Ok(Self::with_fetcher(
            fetcher,
            settings.tmp_dir.clone(),
            settings.lock_dir.clone(),
            reporter,
        ))
    }

    /// Build a pipeline around an existing fetcher.
    pub fn with_fetcher(
        fetcher: Fetcher,
        tmp_dir: PathBuf,
        lock_dir: PathBuf,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            fetcher,
            tmp_dir,
            lock_dir,
            reporter,
        }
    }

    /// Resolve the variant for `host` without touching network or disk.
    pub fn plan<'d>(
        &self,
        descriptor: &'d PackageDescriptor,
        host: &HostArch,
        target_dir: &Path,
    ) -> Result<Resolved<'d>, PipelineError> {
        let variant = select(descriptor, host)?;
        self.reporter
            .resolved(descriptor.name(), descriptor.version(), variant);

        Ok(Resolved {
            descriptor,
            variant,
            target: target_dir.join(descriptor.bin()),
        })
    }

    /// Install `descriptor`'s binary for `host` into `target_dir`.
    ///
    /// On failure nothing at `target_dir/<bin>` has changed and the run's
    /// working directory is gone.
    #[tracing::instrument(
        skip_all,
        fields(package = %descriptor.name(), version = %descriptor.version(), %host)
    )]
    pub async fn run(
        &self,
        descriptor: &PackageDescriptor,
        host: &HostArch,
        target_dir: &Path,
    ) -> Result<InstalledBinary, PipelineError> {
        let result = self.run_stages(descriptor, host, target_dir).await;

        match &result {
            Ok(installed) => {
                self.reporter
                    .done(descriptor.name(), descriptor.version(), installed);
            }
            Err(err) => {
                tracing::debug!(stage = %err.stage(), kind = %err.kind(), error = %err, "install failed");
                self.reporter
                    .failed(descriptor.name(), descriptor.version(), &err.to_string());
            }
        }
        result
    }

    async fn run_stages(
        &self,
        descriptor: &PackageDescriptor,
        host: &HostArch,
        target_dir: &Path,
    ) -> Result<InstalledBinary, PipelineError> {
        let resolved = self.plan(descriptor, host, target_dir)?;
        let fetched = resolved.fetch(self).await?;
        let verified = fetched.verify(&*self.reporter)?;
        let extracted = verified.extract(&*self.reporter)?;
        extracted.install(self).await
    }

    async fn workdir(&self) -> Result<TempDir, FetchError> {
        let io_err = |source| FetchError::Io {
            path: self.tmp_dir.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.tmp_dir)
            .await
            .map_err(io_err)?;
        tempfile::Builder::new()
            .prefix("brewlet-")
            .tempdir_in(&self.tmp_dir)
            .map_err(io_err)
    }
}

/// File name for the downloaded artifact inside the working directory.
fn artifact_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
        "artifact".to_string()
    } else {
        name.to_string()
    }
}
