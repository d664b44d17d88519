//! Subcommand implementations

pub mod hash;
pub mod info;
pub mod install;
pub mod versions;

use std::path::Path;

use anyhow::Result;
use brewlet_schema::{FormulaHistory, PackageDescriptor, Version};

use crate::SelectionError;

/// Load the descriptor named on the command line.
///
/// `path` is either one recipe file or a directory of recipes for the same
/// package. For a directory, `version` picks the entry (latest by default).
/// For a file, `version` must agree with the file if given.
pub fn load_formula(path: &Path, version: Option<&str>) -> Result<PackageDescriptor> {
    if path.is_dir() {
        let history = FormulaHistory::load_dir(path)?;
        let descriptor = match version {
            Some(v) => history.get(&Version::new(v)).ok_or_else(|| {
                SelectionError::UnknownVersion {
                    name: history.name().to_string(),
                    requested: v.to_string(),
                    available: history
                        .versions()
                        .map(Version::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                }
            })?,
            None => history
                .latest()
                .ok_or_else(|| brewlet_schema::HistoryError::Empty(path.to_path_buf()))?,
        };
        tracing::debug!(formula = %descriptor, history = history.len(), "formula selected");
        return Ok(descriptor.clone());
    }

    let descriptor = PackageDescriptor::from_file(path)?;
    if let Some(v) = version {
        if descriptor.version() != &Version::new(v) {
            return Err(SelectionError::VersionMismatch {
                path: path.display().to_string(),
                found: descriptor.version().to_string(),
                requested: v.to_string(),
            }
            .into());
        }
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(version: &str) -> String {
        format!(
            r#"
[package]
name = "pup"
homepage = "https://github.com/EricChiang/pup"
version = "{version}"

[[variant]]
arch = "amd64"
url = "https://github.com/EricChiang/pup/releases/download/v{version}/pup_darwin_amd64.zip"
sha1 = "9d5ad4c0b78701b1868094bf630adbbd26ae1698"
"#
        )
    }

    #[test]
    fn directory_defaults_to_latest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0.3.2.toml"), recipe("0.3.2")).unwrap();
        std::fs::write(dir.path().join("0.4.0.toml"), recipe("0.4.0")).unwrap();

        assert_eq!(load_formula(dir.path(), None).unwrap().version(), &"0.4.0");
        assert_eq!(
            load_formula(dir.path(), Some("0.3.2")).unwrap().version(),
            &"0.3.2"
        );
    }

    #[test]
    fn unknown_version_lists_available() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0.3.2.toml"), recipe("0.3.2")).unwrap();

        let err = load_formula(dir.path(), Some("9.9.9")).unwrap_err();
        assert!(err.to_string().contains("available: 0.3.2"));
        assert_eq!(crate::exit_code(&err), crate::exit::USAGE);
    }

    #[test]
    fn file_version_must_agree() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pup.toml");
        std::fs::write(&file, recipe("0.3.2")).unwrap();

        assert!(load_formula(&file, Some("0.3.2")).is_ok());
        assert!(load_formula(&file, Some("0.4.0")).is_err());
    }
}
