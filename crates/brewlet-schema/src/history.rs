//! Version history of a single package.
//!
//! Recipes are never edited in place: each release adds a new file next to
//! the old ones. `FormulaHistory` is the in-memory view of that append-only
//! log, keyed by version. Callers pick one descriptor out of it and hand that
//! descriptor to the installer explicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::formula::{FormulaError, PackageDescriptor};
use crate::types::{PackageName, Version};

/// Errors that can occur when building a history.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// A recipe could not be loaded.
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// The recipe directory could not be listed.
    #[error("Failed to read formula directory {path}: {source}")]
    Io {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Two recipes declare the same version.
    #[error("{name} {version} is declared more than once")]
    DuplicateVersion {
        /// Package name.
        name: PackageName,
        /// Repeated version.
        version: Version,
    },

    /// A recipe belongs to another package.
    #[error("Formula for '{found}' cannot be added to the history of '{expected}'")]
    NameMismatch {
        /// Package the history tracks.
        expected: PackageName,
        /// Package the recipe declares.
        found: PackageName,
    },

    /// The directory holds no recipes.
    #[error("No formula files found in {0}")]
    Empty(PathBuf),
}

/// All known versions of one package, ordered by version.
#[derive(Debug, Clone)]
pub struct FormulaHistory {
    name: PackageName,
    entries: BTreeMap<Version, PackageDescriptor>,
}

impl FormulaHistory {
    /// Start a history from its first descriptor.
    pub fn new(first: PackageDescriptor) -> Self {
        let name = first.name().clone();
        let mut entries = BTreeMap::new();
        entries.insert(first.version().clone(), first);
        Self { name, entries }
    }

    /// Append a descriptor for a version not yet present.
    pub fn insert(&mut self, descriptor: PackageDescriptor) -> Result<(), HistoryError> {
        if descriptor.name() != &self.name {
            return Err(HistoryError::NameMismatch {
                expected: self.name.clone(),
                found: descriptor.name().clone(),
            });
        }
        if self.entries.contains_key(descriptor.version()) {
            return Err(HistoryError::DuplicateVersion {
                name: self.name.clone(),
                version: descriptor.version().clone(),
            });
        }
        self.entries
            .insert(descriptor.version().clone(), descriptor);
        Ok(())
    }

    /// Load every `*.toml` recipe in `dir` (non-recursive).
    pub fn load_dir(dir: &Path) -> Result<Self, HistoryError> {
        let read = std::fs::read_dir(dir).map_err(|source| HistoryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in read {
            let entry = entry.map_err(|source| HistoryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut history: Option<Self> = None;
        for path in paths {
            let descriptor = PackageDescriptor::from_file(&path)?;
            match history.as_mut() {
                Some(h) => h.insert(descriptor)?,
                None => history = Some(Self::new(descriptor)),
            }
        }

        history.ok_or_else(|| HistoryError::Empty(dir.to_path_buf()))
    }

    /// Package this history tracks.
    pub fn name(&self) -> &PackageName {
        &self.name
    }

    /// The newest version.
    pub fn latest(&self) -> Option<&PackageDescriptor> {
        self.entries.values().next_back()
    }

    /// A specific version, if recorded.
    pub fn get(&self, version: &Version) -> Option<&PackageDescriptor> {
        self.entries.get(version)
    }

    /// Versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.entries.keys()
    }

    /// Descriptors in ascending version order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.entries.values()
    }

    /// Number of recorded versions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a history holds at least its first descriptor.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
