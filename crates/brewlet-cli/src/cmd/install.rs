//! Install command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use brewlet_core::{Pipeline, Settings};
use brewlet_schema::HostArch;
use crossterm::style::Stylize;

use super::load_formula;
use crate::ui::ConsoleReporter;

/// Options for one `brewlet install` invocation.
#[derive(Debug)]
pub struct InstallOptions<'a> {
    pub formula: &'a Path,
    pub version: Option<&'a str>,
    pub arch: Option<HostArch>,
    pub target: Option<PathBuf>,
    pub dry_run: bool,
}

pub async fn install(opts: InstallOptions<'_>) -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    let descriptor = load_formula(opts.formula, opts.version)?;
    let host = opts.arch.unwrap_or_else(HostArch::detect);
    let target_dir = opts.target.unwrap_or_else(|| settings.bin_dir.clone());

    tracing::debug!(?settings, %host, target = %target_dir.display(), "install requested");

    let pipeline = Pipeline::new(&settings, Arc::new(ConsoleReporter::new()))
        .context("Failed to initialize HTTP client")?;

    if opts.dry_run {
        let plan = pipeline.plan(&descriptor, &host, &target_dir)?;
        let variant = plan.variant();
        println!(
            "{} {} {}",
            "Would install".yellow(),
            descriptor.name().as_str().white().bold(),
            descriptor.version().as_str().dark_grey()
        );
        println!("  arch      {}", variant.arch());
        println!("  url       {}", variant.url());
        println!("  checksum  {}", variant.checksum());
        println!("  target    {}", plan.target().display());
        return Ok(());
    }

    pipeline.run(&descriptor, &host, &target_dir).await?;
    Ok(())
}
