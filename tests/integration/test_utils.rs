//! Test utilities for integration tests.
//!
//! This module provides an in-memory [`Store`], a scripted
//! [`IdentityProvider`], and helpers for building routers and reading
//! response bodies.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Response;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use influscan_api::error::{IdentityError, StoreError};
use influscan_api::identity::{EmailAddress, IdentityProvider, SessionClaims, UserProfile};
use influscan_api::store::{Direction, Query, Store};
use influscan_api::{create_router, AppState, RouterConfig, Scan, ScanRepository};

/// RSA private key used to sign session tokens in tests.
pub const SESSION_KEY_PEM: &str = include_str!("../fixtures/session_key.pem");

/// Base64url modulus of [`SESSION_KEY_PEM`].
pub const SESSION_KEY_N: &str = "jTnqyRea1-9I1bwEoD-fBvbVnaRIW7XrMMh9QqFy4hhXE3eXw5rtdSkTMxSXunM6qDQ1jONUMdmdkxVa6cZSKvGVZvKK9dyX0k2QHfjlZtzlvd9PNi5q1kemsKsasJbedgmWFEN5TO4kYDJG945UnqyWIWDK8HS7aQhO1P4XGUzfey2hv1AnWzhNhKmvyd0xgGPz44tiJGw5FjjYTdrC76q6RQKs8fvQIp1TRYPcyMo0cLwIyTN71uTuqrc4Vjeb2kb7ojHpoata9I8g2epqxmMJ6q36STVBOLTj4jh_CoHfTis1YWfI_wolEAl7iEoP0V6npzVLrldsv146x5nmxw";

// =============================================================================
// Mock Store
// =============================================================================

/// An in-memory store that understands equality filters and ordering.
///
/// It can also be scripted to return a fixed body, fail every call, or
/// delay every call. All select queries are recorded.
pub struct MockStore {
    rows: Arc<RwLock<Vec<Value>>>,
    canned_body: Option<Bytes>,
    failure: Option<StoreError>,
    delay: Option<Duration>,
    queries: Arc<RwLock<Vec<Query>>>,
    next_id: Arc<AtomicUsize>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
            canned_body: None,
            failure: None,
            delay: None,
            queries: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Seed the store with existing scans.
    pub fn with_scans(self, scans: Vec<Scan>) -> Self {
        let rows = scans
            .into_iter()
            .map(|scan| serde_json::to_value(scan).unwrap())
            .collect();
        Self {
            rows: Arc::new(RwLock::new(rows)),
            ..self
        }
    }

    /// Answer every select with `body`, whatever the query.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.canned_body = Some(body.into());
        self
    }

    /// Fail every call with `error`.
    pub fn failing(mut self, error: StoreError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Select queries received so far.
    pub async fn queries(&self) -> Vec<Query> {
        self.queries.read().await.clone()
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Clone for MockStore {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            canned_body: self.canned_body.clone(),
            failure: self.failure.clone(),
            delay: self.delay,
            queries: Arc::clone(&self.queries),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

fn column_str<'a>(row: &'a Value, column: &str) -> &'a str {
    row.get(column).and_then(Value::as_str).unwrap_or("")
}

#[async_trait]
impl Store for MockStore {
    async fn select(&self, query: &Query) -> Result<Bytes, StoreError> {
        self.queries.write().await.push(query.clone());
        self.pause().await;

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if let Some(body) = &self.canned_body {
            return Ok(body.clone());
        }

        let mut rows: Vec<Value> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|row| {
                query
                    .filters()
                    .iter()
                    .all(|f| column_str(row, &f.column) == f.value)
            })
            .cloned()
            .collect();

        if let Some(order) = query.order() {
            rows.sort_by(|a, b| column_str(a, &order.column).cmp(column_str(b, &order.column)));
            if order.direction == Direction::Descending {
                rows.reverse();
            }
        }

        Ok(Bytes::from(serde_json::to_vec(&rows).unwrap()))
    }

    async fn insert(&self, _collection: &str, record: Bytes) -> Result<Bytes, StoreError> {
        self.pause().await;

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let mut row: Value = serde_json::from_slice(&record).unwrap();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        row["id"] = Value::String(format!("scan-{id}"));

        self.rows.write().await.push(row.clone());
        Ok(Bytes::from(serde_json::to_vec(&vec![row]).unwrap()))
    }
}

// =============================================================================
// Mock Identity Provider
// =============================================================================

/// An identity provider that accepts a fixed set of tokens.
pub struct MockIdentityProvider {
    sessions: HashMap<String, String>,
    profiles: HashMap<String, UserProfile>,
    profile_failure: Option<IdentityError>,
    verify_calls: AtomicUsize,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            profiles: HashMap::new(),
            profile_failure: None,
            verify_calls: AtomicUsize::new(0),
        }
    }

    /// Accept `token` as a session for `profile`.
    pub fn with_session(mut self, token: &str, profile: UserProfile) -> Self {
        self.sessions.insert(token.to_string(), profile.id.clone());
        self.profiles.insert(profile.id.clone(), profile);
        self
    }

    /// Accept `token` as a session for a user with no profile.
    pub fn with_orphan_session(mut self, token: &str, user_id: &str) -> Self {
        self.sessions.insert(token.to_string(), user_id.to_string());
        self
    }

    /// Fail every profile lookup with `error`.
    pub fn with_profile_failure(mut self, error: IdentityError) -> Self {
        self.profile_failure = Some(error);
        self
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn verify_session(&self, token: &str) -> Result<SessionClaims, IdentityError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        let user_id = self
            .sessions
            .get(token)
            .ok_or_else(|| IdentityError::InvalidToken("unknown session".to_string()))?;

        Ok(SessionClaims {
            sub: user_id.clone(),
            sid: Some(format!("sess_{user_id}")),
            exp: u64::MAX,
            iat: None,
            azp: None,
        })
    }

    async fn get_user(&self, user_id: &str) -> Result<UserProfile, IdentityError> {
        if let Some(err) = &self.profile_failure {
            return Err(err.clone());
        }
        self.profiles
            .get(user_id)
            .cloned()
            .ok_or(IdentityError::UnexpectedStatus(404))
    }
}

// =============================================================================
// Fixtures and Helpers
// =============================================================================

/// A profile with a single primary email address.
pub fn profile(id: &str, email: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        email_addresses: vec![EmailAddress {
            id: format!("idn_{id}"),
            email_address: email.to_string(),
        }],
        primary_email_address_id: Some(format!("idn_{id}")),
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
    }
}

/// A scan created at `hour`:00 UTC on 2024-05-01.
pub fn scan(id: &str, user_id: &str, hour: u32, status: &str) -> Scan {
    Scan {
        id: id.to_string(),
        user_id: user_id.to_string(),
        created_at: format!("2024-05-01T{hour:02}:00:00+00:00"),
        status: status.to_string(),
    }
}

/// Router with authentication through `provider`, tracing disabled.
pub fn router_with(store: MockStore, provider: MockIdentityProvider) -> axum::Router {
    create_router(
        AppState::new(ScanRepository::new(store)).with_environment("test"),
        RouterConfig::new(Arc::new(provider)).with_tracing(false),
    )
}

/// Router with the authentication middleware disabled.
pub fn router_without_auth(store: MockStore) -> axum::Router {
    create_router(
        AppState::new(ScanRepository::new(store)).with_environment("test"),
        RouterConfig::without_auth().with_tracing(false),
    )
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
