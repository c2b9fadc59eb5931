//! Error types.

use std::path::PathBuf;

use thiserror::Error;

/// A single source could not be retrieved.
///
/// Recovered by the refresh cycle: the source is skipped until the next cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS or timeout failure before a response arrived.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The source answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The body stream broke off or timed out.
    #[error("reading body from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body exceeded the configured size limit.
    #[error("{url} body exceeded {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// Snapshot file could not be read, parsed or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read snapshot {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write snapshot {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration file could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    /// Returns the snapshot path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } | Self::Write { path, .. } => path,
        }
    }
}
