//! Versions command

use std::path::Path;

use anyhow::Result;
use brewlet_schema::FormulaHistory;
use crossterm::style::Stylize;

/// List every version in a formula directory, oldest first.
pub fn versions(dir: &Path) -> Result<()> {
    let history = FormulaHistory::load_dir(dir)?;
    let latest = history.latest().map(|d| d.version().clone());

    println!();
    println!("  {}", history.name().as_str().white().bold());
    for descriptor in history.iter() {
        let archs = descriptor
            .architectures()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let marker = if Some(descriptor.version()) == latest.as_ref() {
            " (latest)".green().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<12}{}{marker}",
            descriptor.version().as_str(),
            archs.dark_grey()
        );
    }
    println!();
    Ok(())
}
