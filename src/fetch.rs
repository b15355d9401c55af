//! Size-capped HTTP fetching
//!
//! Redirects follow reqwest's default policy; bodies larger than the cap are
//! truncated rather than rejected.

use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Ceiling for documents and assets (50 MiB)
pub const MAX_BODY_BYTES: usize = 50 << 20;

/// Default ceiling for small text resources such as robots.txt (2 MiB)
pub const DEFAULT_TEXT_BYTES: usize = 2 << 20;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
}

/// Result of a completed fetch
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code
    pub status: u16,
    /// URL after following redirects
    pub final_url: Url,
    /// Content-Type header (empty when absent)
    pub content_type: String,
    /// Response body, truncated to the cap
    pub body: Vec<u8>,
}

/// Shared HTTP client; cheap to clone
#[derive(Debug, Clone)]
pub struct FetchClient {
    http_client: reqwest::Client,
}

impl FetchClient {
    /// Create a client sending `user_agent` and giving up after `timeout`
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if !user_agent.is_empty() {
            builder = builder.user_agent(user_agent);
        }

        Ok(Self {
            http_client: builder.build()?,
        })
    }

    /// Fetch a document or asset, truncating the body at [`MAX_BODY_BYTES`]
    ///
    /// The status code is reported as-is; deciding what to do with error
    /// statuses is up to the caller.
    pub async fn get(&self, url: &Url) -> Result<FetchResult, FetchError> {
        self.fetch(url, MAX_BODY_BYTES).await
    }

    /// Fetch a small text resource; statuses of 400 and above are errors
    ///
    /// A `max_bytes` of zero selects [`DEFAULT_TEXT_BYTES`].
    pub async fn get_text(&self, url: &Url, max_bytes: usize) -> Result<FetchResult, FetchError> {
        let cap = if max_bytes == 0 {
            DEFAULT_TEXT_BYTES
        } else {
            max_bytes
        };
        let result = self.fetch(url, cap).await?;
        if result.status >= 400 {
            return Err(FetchError::Status(result.status));
        }
        Ok(result)
    }

    async fn fetch(&self, url: &Url, cap: usize) -> Result<FetchResult, FetchError> {
        let mut response = self.http_client.get(url.as_str()).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // Stream the body so an oversized response never sits in memory whole
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = cap - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                ::log::debug!("Truncated body of {} at {} bytes", final_url, cap);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchResult {
            status,
            final_url,
            content_type,
            body,
        })
    }
}
