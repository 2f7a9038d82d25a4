//! Clerk-backed implementation of [`IdentityProvider`].
//!
//! Session tokens are RS256 JWTs signed with the instance keys published at
//! `{api_url}/jwks`. Profiles come from `{api_url}/users/{id}`. Both calls
//! authenticate with the instance secret key as a bearer credential.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::IdentityError;

use super::jwks::{JwksDocument, KeySet};
use super::{IdentityProvider, SessionClaims, UserProfile};

/// Default Clerk Backend API base URL.
pub const DEFAULT_CLERK_API_URL: &str = "https://api.clerk.com/v1";

/// Timeout applied to every identity provider request.
pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum spacing between key refreshes triggered by unknown key ids.
pub const MIN_KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Clock skew tolerated when checking `exp` and `nbf`, in seconds.
pub const CLOCK_SKEW_LEEWAY_SECS: u64 = 5;

/// Clerk Backend API client.
pub struct ClerkClient {
    client: Client,
    api_url: Url,
    secret_key: Option<String>,
    keys: KeySet,
}

impl fmt::Debug for ClerkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClerkClient")
            .field("api_url", &self.api_url.as_str())
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ClerkClient {
    /// Create a client for `api_url`.
    ///
    /// Without a secret key every call fails with
    /// [`IdentityError::MissingSecret`].
    pub fn new(api_url: &str, secret_key: Option<String>) -> Result<Self, IdentityError> {
        let api_url = Url::parse(api_url)
            .map_err(|e| IdentityError::Transport(format!("invalid API URL {api_url}: {e}")))?;

        let client = Client::builder()
            .timeout(DEFAULT_IDENTITY_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            secret_key: secret_key.filter(|k| !k.is_empty()),
            keys: KeySet::new(),
        })
    }

    fn secret(&self) -> Result<&str, IdentityError> {
        self.secret_key
            .as_deref()
            .ok_or(IdentityError::MissingSecret)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, IdentityError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| IdentityError::Transport(format!("invalid API URL {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, IdentityError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.secret()?)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(IdentityError::UnexpectedStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| IdentityError::Decode(e.to_string()))
    }

    /// Fetch the instance key set and replace the cached keys.
    ///
    /// Always fetches, and restarts the [`MIN_KEY_REFRESH_INTERVAL`] window.
    pub async fn refresh_keys(&self) -> Result<usize, IdentityError> {
        self.keys.try_claim_refresh(Duration::ZERO).await;
        self.fetch_keys().await
    }

    async fn fetch_keys(&self) -> Result<usize, IdentityError> {
        let doc: JwksDocument = self.get_json(self.endpoint(&["jwks"])?).await?;
        let keys = doc.decoding_keys();
        let count = keys.len();
        self.keys.replace(keys).await;
        debug!(count, "Refreshed session verification keys");
        Ok(count)
    }

    /// Find the key for `kid`. A miss refreshes the key set, at most once
    /// per [`MIN_KEY_REFRESH_INTERVAL`].
    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, IdentityError> {
        if let Some(key) = self.keys.get(kid).await {
            return Ok(key);
        }

        if self.keys.try_claim_refresh(MIN_KEY_REFRESH_INTERVAL).await {
            self.fetch_keys().await?;
        } else {
            debug!(kid = ?kid, "Key refresh skipped, last refresh too recent");
        }

        self.keys
            .get(kid)
            .await
            .ok_or_else(|| IdentityError::KeyNotFound(kid.map(str::to_string)))
    }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn verify_session(&self, token: &str) -> Result<SessionClaims, IdentityError> {
        self.secret()?;

        let header = decode_header(token)
            .map_err(|e| IdentityError::InvalidToken(format!("invalid header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::InvalidToken(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECS;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<SessionClaims>(token, &key, &validation)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;

        Ok(data.claims)
    }

    async fn get_user(&self, user_id: &str) -> Result<UserProfile, IdentityError> {
        self.get_json(self.endpoint(&["users", user_id])?).await
    }
}
