//! Info command

use std::path::Path;

use anyhow::Result;
use brewlet_schema::{Arch, PackageDescriptor};
use crossterm::style::Stylize;
use serde_json::json;

use super::load_formula;

/// Show a formula's metadata and per-architecture artifacts.
pub fn info(formula: &Path, version: Option<&str>, as_json: bool) -> Result<()> {
    let descriptor = load_formula(formula, version)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&to_json(&descriptor))?);
        return Ok(());
    }

    let lw = 12;

    println!();
    println!(
        "  {} {}",
        descriptor.name().as_str().white().bold(),
        descriptor.version().as_str().dark_grey()
    );
    println!();
    if !descriptor.homepage().is_empty() {
        println!("  {:<lw$}{}", "homepage", descriptor.homepage());
    }
    println!("  {:<lw$}{}", "binary", descriptor.bin());
    if let Some(fallback) = descriptor.fallback() {
        println!("  {:<lw$}{}", "fallback", fallback);
    }
    println!();
    for variant in descriptor.variants() {
        println!(
            "  {:<lw$}{} {}",
            variant.arch().as_str().cyan(),
            variant.format().as_str().dark_grey(),
            variant.url()
        );
        println!("  {:<lw$}{}", "", variant.checksum().to_string().dark_grey());
    }
    println!();
    Ok(())
}

fn to_json(descriptor: &PackageDescriptor) -> serde_json::Value {
    let variants: Vec<_> = descriptor
        .variants()
        .iter()
        .map(|v| {
            json!({
                "arch": v.arch().as_str(),
                "url": v.url(),
                "format": v.format().as_str(),
                "checksum": {
                    "algorithm": v.checksum().algorithm().as_str(),
                    "hex": v.checksum().as_str(),
                },
            })
        })
        .collect();

    json!({
        "name": descriptor.name().as_str(),
        "version": descriptor.version().as_str(),
        "homepage": descriptor.homepage(),
        "bin": descriptor.bin(),
        "fallback": descriptor.fallback().as_ref().map(Arch::as_str),
        "variants": variants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewlet_schema::{Arch, ArtifactVariant, Checksum};

    #[test]
    fn json_shape() {
        let descriptor = PackageDescriptor::new(
            "pup",
            "0.3.2",
            vec![ArtifactVariant::new(
                Arch::X86,
                "https://github.com/EricChiang/pup/releases/download/v0.3.2/pup_darwin_386.zip",
                Checksum::sha1("21487bc5abdac34021f25444ab481e267bccbd72").unwrap(),
            )],
        )
        .unwrap()
        .with_fallback(Arch::X86)
        .unwrap();

        let value = to_json(&descriptor);
        assert_eq!(value["name"], "pup");
        assert_eq!(value["fallback"], "x86");
        assert_eq!(value["variants"][0]["format"], "zip");
        assert_eq!(value["variants"][0]["checksum"]["algorithm"], "sha1");
    }
}
