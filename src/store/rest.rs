//! PostgREST-backed implementation of [`Store`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::StatusCode;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};
use url::Url;

use crate::error::StoreError;

use super::{Query, Store};

/// Timeout applied to every store request.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

const PREFER_MINIMAL: &str = "return=minimal";
const PREFER_REPRESENTATION: &str = "return=representation";

/// HTTP client for a PostgREST backend such as Supabase.
///
/// Every request carries the API key both as the `apikey` header and as a
/// bearer credential.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for RestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl RestStore {
    /// Create a store client for `base_url` with the default timeout.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_timeout(base_url, api_key, DEFAULT_STORE_TIMEOUT)
    }

    /// Create a store client with a custom request timeout.
    pub fn with_timeout(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url =
            Url::parse(base_url).map_err(|e| StoreError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Build `{base}/rest/v1/{collection}`.
    fn collection_url(&self, collection: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(["rest", "v1", collection]);
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder, prefer: &str) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", prefer)
    }

    /// Check the status and read the full body.
    async fn read_body(response: Response, expected: StatusCode) -> Result<Bytes, StoreError> {
        let status = response.status();
        if status != expected {
            // The body may describe the failure; keep it in the logs only.
            let detail = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                expected = expected.as_u16(),
                "Store returned unexpected status"
            );
            debug!(body = %detail, "Store error body");
            return Err(StoreError::UnexpectedStatus {
                expected: expected.as_u16(),
                actual: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(format!("error reading response: {e}")))
    }
}

#[async_trait]
impl Store for RestStore {
    async fn select(&self, query: &Query) -> Result<Bytes, StoreError> {
        let url = self.collection_url(query.collection())?;
        debug!(collection = query.collection(), "Store select");

        let response = self
            .authorize(self.client.get(url), PREFER_MINIMAL)
            .query(&query.to_pairs())
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("error executing request: {e}")))?;

        Self::read_body(response, StatusCode::OK).await
    }

    async fn insert(&self, collection: &str, record: Bytes) -> Result<Bytes, StoreError> {
        let url = self.collection_url(collection)?;
        debug!(collection, bytes = record.len(), "Store insert");

        let response = self
            .authorize(self.client.post(url), PREFER_REPRESENTATION)
            .body(record)
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("error executing request: {e}")))?;

        Self::read_body(response, StatusCode::CREATED).await
    }
}
