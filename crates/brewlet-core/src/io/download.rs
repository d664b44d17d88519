//! Artifact download with bounded retry.
//!
//! Streams the response body into a caller-scoped temporary file while
//! keeping the bytes for verification. Transient failures (transport errors,
//! timeouts, 5xx, 408, 429) are retried with exponential backoff; anything
//! else fails on the first attempt.

use std::path::{Path, PathBuf};
use std::time::Duration;

use brewlet_schema::{PackageName, Version};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::Reporter;

/// A download failed; the cause is attached.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, TLS or body read failure.
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status.
        status: StatusCode,
    },

    /// One attempt exceeded the policy's timeout.
    #[error("Download of {url} timed out after {after:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// The per-attempt timeout.
        after: Duration,
    },

    /// The working copy could not be written.
    #[error("Failed to write download to {path}: {source}")]
    Io {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => !source.is_builder(),
            Self::Status { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Timeout { .. } => true,
            Self::Io { .. } => false,
        }
    }
}

/// Retry and timeout policy for downloads.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// Total attempts, including the first (at least 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: u32,
    /// Deadline for a single attempt, body included.
    pub attempt_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            backoff_factor: 2,
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl FetchPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_factor.max(1).saturating_pow(exponent);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Request for a download operation
pub struct DownloadRequest<'a> {
    /// URL to fetch.
    pub url: &'a str,
    /// File the body is written to.
    pub dest: &'a Path,
    /// Package name, for progress reports.
    pub pkg_name: &'a PackageName,
    /// Package version, for progress reports.
    pub version: &'a Version,
    /// Receives progress and retry events.
    pub reporter: &'a dyn Reporter,
}

impl std::fmt::Debug for DownloadRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("url", &self.url)
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

/// HTTP downloader shared by every install in the process.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
}

impl Fetcher {
    /// Create a fetcher with its own connection pool.
    pub fn new(policy: FetchPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(crate::USER_AGENT).build()?;
        Ok(Self::with_client(client, policy))
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: Client, policy: FetchPolicy) -> Self {
        Self { client, policy }
    }

    /// The retry policy in effect.
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Download `req.url` into `req.dest`, returning the body.
    ///
    /// On failure no partial file is left at `req.dest`.
    #[tracing::instrument(skip_all, fields(url = %req.url))]
    pub async fn fetch(&self, req: &DownloadRequest<'_>) -> Result<Bytes, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome =
                match tokio::time::timeout(self.policy.attempt_timeout, self.fetch_once(req)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout {
                        url: req.url.to_string(),
                        after: self.policy.attempt_timeout,
                    }),
                };

            let err = match outcome {
                Ok(bytes) => {
                    tracing::debug!(attempt, bytes = bytes.len(), "download complete");
                    return Ok(bytes);
                }
                Err(err) => err,
            };

            discard_partial(req.dest).await;

            if !err.is_transient() || attempt >= max_attempts {
                tracing::debug!(attempt, error = %err, "download failed");
                return Err(err);
            }

            let delay = self.policy.backoff_for(attempt);
            tracing::debug!(
                attempt,
                max_attempts,
                ?delay,
                error = %err,
                "download failed, retrying"
            );
            req.reporter
                .retrying(req.pkg_name, req.version, attempt, &err.to_string());
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_once(&self, req: &DownloadRequest<'_>) -> Result<Bytes, FetchError> {
        let url = req.url;
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let io_err = |source| FetchError::Io {
            path: req.dest.to_path_buf(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let total = response.content_length();
        req.reporter
            .downloading(req.pkg_name, req.version, 0, total);

        let mut file = File::create(req.dest).await.map_err(io_err)?;
        let mut stream = response.bytes_stream();
        let mut body = Vec::with_capacity(total.map_or(0, |t| t.min(64 * 1024 * 1024) as usize));

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport)?;
            file.write_all(&chunk).await.map_err(io_err)?;
            body.extend_from_slice(&chunk);
            req.reporter
                .downloading(req.pkg_name, req.version, body.len() as u64, total);
        }

        file.flush().await.map_err(io_err)?;
        Ok(Bytes::from(body))
    }
}

async fn discard_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => tracing::debug!(path = %dest.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %dest.display(), error = %e, "failed to remove partial download"),
    }
}
