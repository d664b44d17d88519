//! Console output

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use brewlet_core::{InstalledBinary, Reporter};
use brewlet_schema::{ArtifactVariant, Checksum, PackageName, Version};
use crossterm::style::Stylize;

/// Human-readable byte count.
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}

/// Reporter that prints one line per stage to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    /// Whether the completed download has been announced for this run.
    download_done: Mutex<bool>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&self, marker: impl std::fmt::Display, name: &PackageName, version: &Version, msg: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(
            err,
            "  {marker} {} {} {msg}",
            name.as_str().white().bold(),
            version.as_str().dark_grey()
        );
    }
}

impl Reporter for ConsoleReporter {
    fn resolved(&self, name: &PackageName, version: &Version, variant: &ArtifactVariant) {
        if let Ok(mut done) = self.download_done.lock() {
            *done = false;
        }
        self.line(
            "→".cyan(),
            name,
            version,
            &format!("{} ({})", variant.url(), variant.arch()),
        );
    }

    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        if total != Some(current) || current == 0 {
            return;
        }
        let Ok(mut done) = self.download_done.lock() else {
            return;
        };
        if !*done {
            *done = true;
            self.line("↓".cyan(), name, version, &format!("fetched {}", format_size(current)));
        }
    }

    fn retrying(&self, name: &PackageName, version: &Version, attempt: u32, reason: &str) {
        self.line(
            "!".yellow(),
            name,
            version,
            &format!("attempt {attempt} failed ({reason}), retrying"),
        );
    }

    fn verified(&self, name: &PackageName, version: &Version, checksum: &Checksum) {
        self.line("✓".green(), name, version, &format!("{checksum}"));
    }

    fn extracting(&self, _name: &PackageName, _version: &Version, _entries: usize) {}

    fn installing(&self, _name: &PackageName, _version: &Version, _target: &Path) {}

    fn done(&self, name: &PackageName, version: &Version, installed: &InstalledBinary) {
        self.line(
            "✓".green().bold(),
            name,
            version,
            &format!(
                "installed {} ({})",
                installed.path.display(),
                format_size(installed.size)
            ),
        );
    }

    // main prints the error with its full context.
    fn failed(&self, _name: &PackageName, _version: &Version, _reason: &str) {}
}
