//! Architecture selection.
//!
//! Selection is a lookup over the descriptor's variants keyed by [`Arch`],
//! followed by the descriptor's designated fallback. Hosts of an unknown
//! instruction set are looked up by word size. Supporting a new architecture
//! means adding a variant to a recipe, not a branch here.

use brewlet_schema::{Arch, ArtifactVariant, HostArch, PackageDescriptor, PackageName};
use thiserror::Error;

/// No variant of the descriptor can run on the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{package} has no artifact for architecture {host} (available: {})", format_archs(.available))]
pub struct SelectError {
    /// Package being installed.
    pub package: PackageName,
    /// Host classification that failed to match.
    pub host: HostArch,
    /// Architectures the descriptor publishes.
    pub available: Vec<Arch>,
}

fn format_archs(archs: &[Arch]) -> String {
    archs
        .iter()
        .map(Arch::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pick the variant to install on `host`.
///
/// The variant for the host's class wins. Otherwise the descriptor's
/// fallback variant is used if one is designated and it runs on the host.
pub fn select<'a>(
    descriptor: &'a PackageDescriptor,
    host: &HostArch,
) -> Result<&'a ArtifactVariant, SelectError> {
    if let Some(variant) = host.class().and_then(|arch| descriptor.variant_for(arch)) {
        tracing::debug!(
            package = %descriptor.name(),
            %host,
            arch = %variant.arch(),
            "architecture match"
        );
        return Ok(variant);
    }

    if let Some(variant) = descriptor
        .fallback()
        .filter(|arch| arch.runs_on(host))
        .and_then(|arch| descriptor.variant_for(arch))
    {
        tracing::debug!(
            package = %descriptor.name(),
            %host,
            fallback = %variant.arch(),
            "no exact match, using fallback variant"
        );
        return Ok(variant);
    }

    Err(SelectError {
        package: descriptor.name().clone(),
        host: host.clone(),
        available: descriptor.architectures(),
    })
}
