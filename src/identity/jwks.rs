//! JSON Web Key Set parsing and in-memory key storage.
//!
//! Session tokens are verified against the RSA keys the identity provider
//! publishes. Keys are indexed by `kid`; the set is replaced wholesale on
//! every refresh. Refresh attempts are timestamped so that a burst of tokens
//! with unknown key ids cannot turn into a burst of fetches.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// A single JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA")
    pub kty: String,
    /// Key ID, matched against the token header `kid`
    pub kid: Option<String>,
    /// Algorithm (e.g., "RS256")
    pub alg: Option<String>,
    /// Key use ("sig" or "enc")
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus (base64url)
    pub n: Option<String>,
    /// RSA exponent (base64url)
    pub e: Option<String>,
}

/// A JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

impl JwksDocument {
    /// Convert the usable signing keys into decoding keys, indexed by kid.
    ///
    /// Non-RSA keys, encryption keys, and keys with invalid components are
    /// skipped. A key without a kid is stored under `"default"`.
    pub fn decoding_keys(&self) -> HashMap<String, DecodingKey> {
        let mut keys = HashMap::new();

        for jwk in &self.keys {
            if jwk.kty != "RSA" {
                debug!(kty = %jwk.kty, "Skipping non-RSA key");
                continue;
            }
            if jwk.key_use.as_deref() == Some("enc") {
                debug!("Skipping encryption key");
                continue;
            }

            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                warn!(kid = ?jwk.kid, "Skipping RSA key without modulus/exponent");
                continue;
            };

            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => {
                    let kid = jwk.kid.clone().unwrap_or_else(|| DEFAULT_KID.to_string());
                    keys.insert(kid, key);
                }
                Err(err) => warn!(kid = ?jwk.kid, error = %err, "Failed to parse JWK"),
            }
        }

        keys
    }
}

const DEFAULT_KID: &str = "default";

/// Thread-safe store of verification keys.
#[derive(Default)]
pub struct KeySet {
    keys: RwLock<HashMap<String, DecodingKey>>,
    /// Time of the last refresh attempt, successful or not.
    last_refresh: Mutex<Option<Instant>>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key. Without a kid, any key is returned.
    pub async fn get(&self, kid: Option<&str>) -> Option<DecodingKey> {
        let keys = self.keys.read().await;
        match kid {
            Some(kid) => keys.get(kid).cloned(),
            None => keys.values().next().cloned(),
        }
    }

    /// Replace the whole key set.
    pub async fn replace(&self, keys: HashMap<String, DecodingKey>) {
        *self.keys.write().await = keys;
    }

    /// Record a refresh attempt unless one was recorded less than
    /// `min_interval` ago. Returns whether the caller may fetch.
    pub async fn try_claim_refresh(&self, min_interval: Duration) -> bool {
        let mut last = self.last_refresh.lock().await;
        if last.is_some_and(|at| at.elapsed() < min_interval) {
            return false;
        }
        *last = Some(Instant::now());
        true
    }
}
