//! Settings and filesystem layout.
//!
//! Resolution order, later wins:
//! 1. defaults rooted at `BREWLET_HOME` or `~/.brewlet`
//! 2. `<home>/config.toml`, if present
//! 3. `BREWLET_BIN_DIR`, `BREWLET_TMP_DIR`, `BREWLET_FETCH_ATTEMPTS`,
//!    `BREWLET_FETCH_TIMEOUT_SECS`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::io::download::FetchPolicy;

/// Root of all brewlet state.
pub const HOME_ENV: &str = "BREWLET_HOME";
/// Default install directory.
pub const BIN_DIR_ENV: &str = "BREWLET_BIN_DIR";
/// Parent of per-run working directories.
pub const TMP_DIR_ENV: &str = "BREWLET_TMP_DIR";
/// Download attempts, including the first.
pub const FETCH_ATTEMPTS_ENV: &str = "BREWLET_FETCH_ATTEMPTS";
/// Per-attempt download timeout in seconds.
pub const FETCH_TIMEOUT_ENV: &str = "BREWLET_FETCH_TIMEOUT_SECS";

const CONFIG_FILE: &str = "config.toml";

/// Settings could not be resolved.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither `BREWLET_HOME` nor a user home directory is available.
    #[error("Could not determine home directory. Set {HOME_ENV} to override.")]
    NoHome,

    /// The config file exists but could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment override does not parse.
    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Resolved settings for one process.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Root of all brewlet state
    pub home: PathBuf,
    /// Default install directory for binaries
    pub bin_dir: PathBuf,
    /// Parent of per-run working directories
    pub tmp_dir: PathBuf,
    /// Per-target lock files
    pub lock_dir: PathBuf,
    /// Download retry policy
    pub fetch: FetchPolicy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bin_dir: Option<PathBuf>,
    tmp_dir: Option<PathBuf>,
    #[serde(default)]
    fetch: FileFetch,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileFetch {
    attempts: Option<u32>,
    timeout_secs: Option<u64>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
}

impl Settings {
    /// Defaults rooted at `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            bin_dir: home.join("bin"),
            tmp_dir: home.join("tmp"),
            lock_dir: home.join("locks"),
            home,
            fetch: FetchPolicy::default(),
        }
    }

    /// Load settings from the process environment and the config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load settings with `env` standing in for the process environment.
    pub fn load_from(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let home = match env(HOME_ENV) {
            Some(home) if !home.is_empty() => PathBuf::from(home),
            _ => dirs::home_dir()
                .map(|h| h.join(".brewlet"))
                .ok_or(ConfigError::NoHome)?,
        };

        let mut settings = Self::with_home(&home);

        let config_path = home.join(CONFIG_FILE);
        if let Some(file) = read_config_file(&config_path)? {
            settings.apply_file(file);
            tracing::debug!(path = %config_path.display(), "loaded config file");
        }

        settings.apply_env(&env)?;
        Ok(settings)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(dir) = file.bin_dir {
            self.bin_dir = self.relative_to_home(dir);
        }
        if let Some(dir) = file.tmp_dir {
            self.tmp_dir = self.relative_to_home(dir);
        }
        if let Some(attempts) = file.fetch.attempts {
            self.fetch.max_attempts = attempts.max(1);
        }
        if let Some(secs) = file.fetch.timeout_secs {
            self.fetch.attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = file.fetch.initial_backoff_ms {
            self.fetch.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = file.fetch.max_backoff_ms {
            self.fetch.max_backoff = Duration::from_millis(ms);
        }
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = env(BIN_DIR_ENV).filter(|v| !v.is_empty()) {
            self.bin_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env(TMP_DIR_ENV).filter(|v| !v.is_empty()) {
            self.tmp_dir = PathBuf::from(dir);
        }
        if let Some(value) = env(FETCH_ATTEMPTS_ENV) {
            let attempts: u32 = parse_env(FETCH_ATTEMPTS_ENV, &value)?;
            self.fetch.max_attempts = attempts.max(1);
        }
        if let Some(value) = env(FETCH_TIMEOUT_ENV) {
            let secs: u64 = parse_env(FETCH_TIMEOUT_ENV, &value)?;
            self.fetch.attempt_timeout = Duration::from_secs(secs);
        }
        Ok(())
    }

    fn relative_to_home(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.home.join(path)
        }
    }

    /// Path of the config file read by [`Settings::load`].
    pub fn config_path(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }
}

fn read_config_file(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    toml::from_str(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}
