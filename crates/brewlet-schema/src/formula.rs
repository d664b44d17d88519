//! TOML formula recipes.
//!
//! One recipe file describes one version of one package and is wholly
//! self-contained:
//!
//! ```toml
//! [package]
//! name = "pup"
//! homepage = "https://github.com/EricChiang/pup"
//! version = "0.3.2"
//!
//! [install]
//! bin = "pup"
//! fallback = "x86"
//!
//! [[variant]]
//! arch = "amd64"
//! url = "https://github.com/EricChiang/pup/releases/download/v0.3.2/pup_darwin_amd64.zip"
//! sha1 = "9d5ad4c0b78701b1868094bf630adbbd26ae1698"
//! ```
//!
//! Parsing goes through private raw structs and is then validated into a
//! [`PackageDescriptor`], so a descriptor that exists is always usable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arch::Arch;
use crate::hash::{Checksum, ChecksumError, DigestAlgorithm};
use crate::types::{ArtifactFormat, PackageName, Version};

/// Errors that can occur when loading or validating a formula.
#[derive(Error, Debug)]
pub enum FormulaError {
    /// The recipe file could not be read.
    #[error("Failed to read formula {path}: {source}")]
    Io {
        /// Recipe path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be deserialized.
    #[error("Failed to parse formula {origin}: {source}")]
    Parse {
        /// File path or `<inline>`.
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A required field is empty.
    #[error("Formula field '{0}' must not be empty")]
    EmptyField(&'static str),

    /// A variant URL is not an http(s) URL.
    #[error("Variant {arch} has invalid URL '{url}': must start with http:// or https://")]
    InvalidUrl {
        /// Variant architecture.
        arch: Arch,
        /// The rejected URL.
        url: String,
    },

    /// The formula declares no variants.
    #[error("Formula declares no artifact variants")]
    NoVariants,

    /// Two variants target the same architecture.
    #[error("Formula declares more than one variant for {0}")]
    DuplicateArch(Arch),

    /// A variant has neither `sha1` nor `sha256`.
    #[error("Variant {0} has no checksum (expected one of sha1, sha256)")]
    MissingChecksum(Arch),

    /// A variant has both `sha1` and `sha256`.
    #[error("Variant {0} declares more than one checksum")]
    ConflictingChecksum(Arch),

    /// A variant checksum is malformed.
    #[error("Variant {arch} has a malformed checksum: {source}")]
    Checksum {
        /// Variant architecture.
        arch: Arch,
        /// Validation failure.
        #[source]
        source: ChecksumError,
    },

    /// The designated fallback architecture has no variant.
    #[error("Fallback architecture {0} has no matching variant")]
    MissingFallback(Arch),

    /// The binary name is not a plain file name.
    #[error("Binary name '{0}' must be a plain file name")]
    InvalidBin(String),
}

/// One architecture-specific download of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactVariant {
    arch: Arch,
    url: String,
    checksum: Checksum,
    format: ArtifactFormat,
}

impl ArtifactVariant {
    /// Create a variant; the archive format is detected from the URL.
    pub fn new(arch: Arch, url: impl Into<String>, checksum: Checksum) -> Self {
        let url = url.into();
        let format = ArtifactFormat::detect(&url);
        Self {
            arch,
            url,
            checksum,
            format,
        }
    }

    /// Override the detected archive format.
    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.format = format;
        self
    }

    /// Architecture this variant was built for.
    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Download URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Expected digest of the downloaded bytes.
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Archive format of the download.
    pub fn format(&self) -> ArtifactFormat {
        self.format
    }
}

/// A validated, immutable description of one package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    name: PackageName,
    homepage: String,
    version: Version,
    bin: String,
    fallback: Option<Arch>,
    variants: Vec<ArtifactVariant>,
}

impl PackageDescriptor {
    /// Build a descriptor from its parts.
    ///
    /// The binary name defaults to the package name and no fallback is
    /// designated; use [`with_bin`](Self::with_bin) and
    /// [`with_fallback`](Self::with_fallback) to change that.
    pub fn new(
        name: &str,
        version: &str,
        variants: Vec<ArtifactVariant>,
    ) -> Result<Self, FormulaError> {
        Self::build(name, version, variants, None)
    }

    fn build(
        name: &str,
        version: &str,
        variants: Vec<ArtifactVariant>,
        bin: Option<&str>,
    ) -> Result<Self, FormulaError> {
        let name = PackageName::new(name);
        let version = Version::new(version);
        if name.is_empty() {
            return Err(FormulaError::EmptyField("package.name"));
        }
        if version.is_empty() {
            return Err(FormulaError::EmptyField("package.version"));
        }
        validate_variants(&variants)?;
        let bin = validate_bin(bin.unwrap_or(name.as_str()))?;

        Ok(Self {
            bin,
            name,
            homepage: String::new(),
            version,
            fallback: None,
            variants,
        })
    }

    /// Set the project homepage.
    pub fn with_homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = homepage.into();
        self
    }

    /// Set the name of the executable to install from the artifact.
    pub fn with_bin(mut self, bin: &str) -> Result<Self, FormulaError> {
        self.bin = validate_bin(bin)?;
        Ok(self)
    }

    /// Designate the variant used when the host matches no variant exactly.
    pub fn with_fallback(mut self, arch: Arch) -> Result<Self, FormulaError> {
        if self.variant_for(arch).is_none() {
            return Err(FormulaError::MissingFallback(arch));
        }
        self.fallback = Some(arch);
        Ok(self)
    }

    /// Parse a formula from a TOML file on disk.
    pub fn from_file(path: &Path) -> Result<Self, FormulaError> {
        let content = std::fs::read_to_string(path).map_err(|source| FormulaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_with_origin(&content, &path.display().to_string())
    }

    /// Parse a formula from a TOML string.
    pub fn parse(content: &str) -> Result<Self, FormulaError> {
        Self::parse_with_origin(content, "<inline>")
    }

    fn parse_with_origin(content: &str, origin: &str) -> Result<Self, FormulaError> {
        let raw: RawFormula = toml::from_str(content).map_err(|source| FormulaError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        raw.into_descriptor()
    }

    /// Package name.
    pub fn name(&self) -> &PackageName {
        &self.name
    }

    /// Project homepage (may be empty).
    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    /// Package version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Name of the executable installed from the artifact.
    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// Designated lowest-common-denominator architecture, if any.
    pub fn fallback(&self) -> Option<Arch> {
        self.fallback
    }

    /// Variants in declaration order.
    pub fn variants(&self) -> &[ArtifactVariant] {
        &self.variants
    }

    /// The variant published for `arch`, if any.
    pub fn variant_for(&self, arch: Arch) -> Option<&ArtifactVariant> {
        self.variants.iter().find(|v| v.arch == arch)
    }

    /// Architectures this descriptor publishes, in declaration order.
    pub fn architectures(&self) -> Vec<Arch> {
        self.variants.iter().map(ArtifactVariant::arch).collect()
    }
}

impl std::fmt::Display for PackageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

fn validate_bin(bin: &str) -> Result<String, FormulaError> {
    let bin = bin.trim();
    if bin.is_empty() || bin == "." || bin == ".." || bin.contains('/') || bin.contains('\\') {
        return Err(FormulaError::InvalidBin(bin.to_string()));
    }
    Ok(bin.to_string())
}

fn validate_variants(variants: &[ArtifactVariant]) -> Result<(), FormulaError> {
    if variants.is_empty() {
        return Err(FormulaError::NoVariants);
    }

    let mut seen = Vec::with_capacity(variants.len());
    for variant in variants {
        if seen.contains(&variant.arch) {
            return Err(FormulaError::DuplicateArch(variant.arch));
        }
        seen.push(variant.arch);

        if !(variant.url.starts_with("https://") || variant.url.starts_with("http://")) {
            return Err(FormulaError::InvalidUrl {
                arch: variant.arch,
                url: variant.url.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFormula {
    package: RawPackage,
    #[serde(default)]
    install: RawInstall,
    #[serde(default, rename = "variant")]
    variants: Vec<RawVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    name: String,
    version: String,
    #[serde(default)]
    homepage: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInstall {
    bin: Option<String>,
    fallback: Option<Arch>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVariant {
    arch: Arch,
    url: String,
    sha1: Option<String>,
    sha256: Option<String>,
    format: Option<ArtifactFormat>,
}

impl RawVariant {
    fn into_variant(self) -> Result<ArtifactVariant, FormulaError> {
        let arch = self.arch;
        let (algorithm, digest) = match (self.sha1, self.sha256) {
            (Some(d), None) => (DigestAlgorithm::Sha1, d),
            (None, Some(d)) => (DigestAlgorithm::Sha256, d),
            (None, None) => return Err(FormulaError::MissingChecksum(arch)),
            (Some(_), Some(_)) => return Err(FormulaError::ConflictingChecksum(arch)),
        };
        let checksum = Checksum::new(algorithm, &digest)
            .map_err(|source| FormulaError::Checksum { arch, source })?;

        let variant = ArtifactVariant::new(arch, self.url.trim(), checksum);
        Ok(match self.format {
            Some(format) => variant.with_format(format),
            None => variant,
        })
    }
}

impl RawFormula {
    fn into_descriptor(self) -> Result<PackageDescriptor, FormulaError> {
        let variants = self
            .variants
            .into_iter()
            .map(RawVariant::into_variant)
            .collect::<Result<Vec<_>, _>>()?;

        let mut descriptor = PackageDescriptor::build(
            &self.package.name,
            &self.package.version,
            variants,
            self.install.bin.as_deref(),
        )?
        .with_homepage(self.package.homepage.trim());

        if let Some(arch) = self.install.fallback {
            descriptor = descriptor.with_fallback(arch)?;
        }
        Ok(descriptor)
    }
}
