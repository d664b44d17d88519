//! brewlet core - resolve, fetch, verify, extract and install formula artifacts.
//!
//! # Pipeline
//!
//! ```text
//! descriptor --select--> variant --fetch--> bytes --verify--> trusted bytes
//!            --extract--> entries --install--> <target_dir>/<bin>
//! ```
//!
//! Each stage lives in its own module and returns its own error type; the
//! [`pipeline`] module composes them into a typestate flow where a failure at
//! any stage is terminal for that run.

pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod reporter;
pub mod select;
pub mod verify;

pub use config::Settings;
pub use error::{FailureKind, PipelineError};
pub use io::install::InstalledBinary;
pub use pipeline::{Pipeline, Stage};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for artifact downloads
pub const USER_AGENT: &str = concat!("brewlet/", env!("CARGO_PKG_VERSION"));
