//! Retrieval of source lists.
//!
//! A source is fetched exactly once per refresh cycle; there is no retry.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::RefreshConfig;
use crate::error::FetchError;

const USER_AGENT: &str = concat!("dispo/", env!("CARGO_PKG_VERSION"));

/// Returns the raw text body of a source.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<String, FetchError>;
}

/// HTTP(S) fetcher backed by reqwest.
///
/// Bodies are read in chunks and capped at `max_body_bytes`. Invalid UTF-8 is
/// replaced rather than rejected; the resulting garbage lines never match a
/// real domain.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Builds a client with the configured per-request timeout.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(config: &RefreshConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::with_client(client, config.max_body_bytes))
    }

    /// Uses a preconfigured client.
    pub fn with_client(client: reqwest::Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, source: &str) -> Result<String, FetchError> {
        let mut response =
            self.client
                .get(source)
                .send()
                .await
                .map_err(|source_err| FetchError::Request {
                    url: source.to_string(),
                    source: source_err,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: source.to_string(),
                status,
            });
        }

        let too_large = || FetchError::TooLarge {
            url: source.to_string(),
            limit: self.max_body_bytes,
        };

        let declared = response
            .content_length()
            .map_or(0, |len| usize::try_from(len).unwrap_or(usize::MAX));
        if declared > self.max_body_bytes {
            return Err(too_large());
        }

        let mut body = Vec::with_capacity(declared);
        while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Body {
            url: source.to_string(),
            source: e,
        })? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
