//! Document loading: HTTP with retry, filesystem, inline.
//!
//! This is the only place that touches the network or disk for schemas.
//! Every failure is reported as a plain reason string; the registry wraps it
//! into `SchemaUnavailable` for the kind being loaded.

use std::path::Path;
use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use super::SchemaSource;

const USER_AGENT_VALUE: &str = concat!("evalfn-core/", env!("CARGO_PKG_VERSION"));

/// Failure of a single fetch attempt.
#[derive(Debug)]
enum FetchError {
    /// Worth retrying (connection errors, 5xx, 429).
    Transient(String),
    /// Not worth retrying (4xx, malformed body).
    Permanent(String),
}

impl FetchError {
    fn into_reason(self) -> String {
        match self {
            Self::Transient(m) | Self::Permanent(m) => m,
        }
    }
}

/// Loads schema documents from their configured sources.
#[derive(Debug, Clone)]
pub(crate) struct DocumentLoader {
    client: reqwest::Client,
    max_retries: u32,
}

/// Upper bound of the jittered delay before retry number `retry`.
fn backoff_ceiling(retry: u32) -> Duration {
    Duration::from_millis(100u64 << retry.min(5)).min(Duration::from_secs(2))
}

impl DocumentLoader {
    pub(crate) fn new(timeout: Duration, max_retries: u32) -> Result<Self, String> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/schema+json, application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| format!("failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            max_retries,
        })
    }

    /// Load and parse the document behind `source`.
    pub(crate) async fn load(&self, source: &SchemaSource) -> Result<Value, String> {
        match source {
            SchemaSource::Url(url) => self.fetch_url(url.as_str()).await,
            SchemaSource::Path(path) => read_path(path).await,
            SchemaSource::Inline(doc) => Ok(doc.as_ref().clone()),
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Value, String> {
        let mut retries = 0;

        loop {
            match self.fetch_once(url).await {
                Ok(doc) => return Ok(doc),
                Err(FetchError::Transient(message)) if retries < self.max_retries => {
                    retries += 1;
                    let base = backoff_ceiling(retries);
                    let jittered_ms =
                        rand::thread_rng().gen_range(0..=base.as_millis() as u64);
                    let backoff = Duration::from_millis(jittered_ms.max(10));

                    warn!(
                        url = %url,
                        error = %message,
                        retry = retries,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying schema fetch"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e.into_reason()),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Value, FetchError> {
        debug!(url = %url, "fetching schema");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Permanent(format!("timed out fetching {}", url))
            } else {
                FetchError::Transient(format!("request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            429 | 500..=599 => {
                return Err(FetchError::Transient(format!(
                    "HTTP {} from {}",
                    status.as_u16(),
                    url
                )))
            }
            _ => {
                return Err(FetchError::Permanent(format!(
                    "HTTP {} from {}",
                    status.as_u16(),
                    url
                )))
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transient(format!("failed to read body from {}: {}", url, e)))?;

        serde_json::from_slice(&body)
            .map_err(|e| FetchError::Permanent(format!("schema at {} is not valid JSON: {}", url, e)))
    }
}

async fn read_path(path: &Path) -> Result<Value, String> {
    debug!(path = %path.display(), "reading schema");

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("could not read {}: {}", path.display(), e))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| format!("schema at {} is not valid JSON: {}", path.display(), e))
}
