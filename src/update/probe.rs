//! Remote list metadata probe

use crate::config::FilmlistConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, ETAG, LAST_MODIFIED};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Cheap fingerprint of a remote list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    pub url: String,
    pub content_length: Option<u64>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

impl RemoteMetadata {
    /// Read the fingerprint headers of a response for `url`
    pub fn from_headers(url: &str, headers: &HeaderMap) -> Self {
        let text = |name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            url: url.to_string(),
            content_length: text(CONTENT_LENGTH).and_then(|v| v.parse().ok()),
            last_modified: text(LAST_MODIFIED),
            etag: text(ETAG),
        }
    }

    /// Whether `self` describes a different list than `previous`.
    ///
    /// Compares the first fingerprint both sides carry, in the order etag,
    /// last-modified, content length. Nothing to compare counts as changed.
    pub fn changed_since(&self, previous: Option<&RemoteMetadata>) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        if let (Some(a), Some(b)) = (&self.etag, &previous.etag) {
            return a != b;
        }
        if let (Some(a), Some(b)) = (&self.last_modified, &previous.last_modified) {
            return a != b;
        }
        if let (Some(a), Some(b)) = (self.content_length, previous.content_length) {
            return a != b;
        }
        true
    }
}

/// Source of remote list metadata
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<RemoteMetadata>;
}

/// Probe using an HTTP HEAD request
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(config: &FilmlistConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MetadataProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<RemoteMetadata> {
        let response = self.client.head(url).send().await?.error_for_status()?;
        let metadata = RemoteMetadata::from_headers(url, response.headers());
        debug!(
            url,
            content_length = ?metadata.content_length,
            etag = ?metadata.etag,
            "Probed remote list"
        );
        Ok(metadata)
    }
}
