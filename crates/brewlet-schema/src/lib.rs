//! Shared types for brewlet formulas.
//!
//! A formula is a declarative, self-contained recipe describing how to obtain
//! one version of a precompiled tool: its homepage, version, the download URL
//! and checksum for each supported architecture, and the name of the binary
//! to install. This crate owns the data model and the TOML recipe format; it
//! performs no network or install work.

pub mod arch;
pub mod formula;
pub mod hash;
pub mod history;
pub mod types;

// Re-exports
pub use arch::*;
pub use formula::{ArtifactVariant, FormulaError, PackageDescriptor};
pub use hash::*;
pub use history::{FormulaHistory, HistoryError};
pub use types::*;
