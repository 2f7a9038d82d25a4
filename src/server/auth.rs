//! Session authentication for the scan API.
//!
//! Every request except the health probe must carry a session token issued
//! by the identity provider, either as a bearer credential:
//!
//! ```text
//! Authorization: Bearer <session-jwt>
//! ```
//!
//! or in the provider's session cookie (`__session`). The middleware verifies
//! the token, loads the caller's profile, and attaches the resulting
//! [`Identity`] to the request. Handlers receive it through the
//! [`RequireIdentity`] extractor.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::error::IdentityError;
use crate::identity::{Identity, IdentityProvider};

use super::handlers::ErrorResponse;

/// Path served without authentication.
pub const HEALTH_PATH: &str = "/health";

/// Cookie carrying the session token when no bearer credential is sent.
pub const SESSION_COOKIE: &str = "__session";

// =============================================================================
// Types
// =============================================================================

/// Authentication error types.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No session token on the request
    MissingSession,

    /// The session token failed verification
    InvalidSession(IdentityError),

    /// The session is valid but the caller's profile could not be loaded
    ProfileLookup(IdentityError),

    /// A handler that needs an identity ran without one
    MissingIdentity,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingSession => write!(f, "Missing session token"),
            AuthError::InvalidSession(err) => write!(f, "Invalid session: {}", err),
            AuthError::ProfileLookup(err) => write!(f, "Profile lookup failed: {}", err),
            AuthError::MissingIdentity => write!(f, "No identity attached to request"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingSession | AuthError::InvalidSession(_) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "access": "unauthorized" })),
            )
                .into_response(),
            AuthError::ProfileLookup(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal()),
            )
                .into_response(),
            AuthError::MissingIdentity => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Unauthorized - Authentication required")),
            )
                .into_response(),
        }
    }
}

/// State for [`auth_middleware`]: the provider that verifies sessions.
#[derive(Clone)]
pub struct SessionAuth {
    provider: Arc<dyn IdentityProvider>,
}

impl SessionAuth {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Verify `token` and resolve it to a full identity.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self
            .provider
            .verify_session(token)
            .await
            .map_err(AuthError::InvalidSession)?;

        let profile = self
            .provider
            .get_user(&claims.sub)
            .await
            .map_err(AuthError::ProfileLookup)?;

        Ok(Identity::from_profile(profile))
    }
}

// =============================================================================
// Token Extraction
// =============================================================================

/// Extract the session token from a request's headers.
///
/// A non-empty `Authorization: Bearer` value wins; otherwise the
/// [`SESSION_COOKIE`] cookie is used.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| session_cookie(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Axum middleware that authenticates every request except [`HEALTH_PATH`].
///
/// - No token, or verification fails: `401 {"access": "unauthorized"}`
/// - Profile lookup fails: `500 {"error": "Internal Server Error"}`
/// - Otherwise the [`Identity`] is inserted into the request extensions.
pub async fn auth_middleware(
    State(auth): State<SessionAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if request.uri().path() == HEALTH_PATH {
        return Ok(next.run(request).await);
    }

    let Some(token) = session_token(request.headers()) else {
        debug!(path = %request.uri().path(), "Request without session token");
        return Err(AuthError::MissingSession);
    };

    let identity = auth.authenticate(&token).await.inspect_err(|err| match err {
        AuthError::InvalidSession(cause) if cause.is_credential_error() => {
            debug!(error = %cause, "Rejected session token")
        }
        AuthError::InvalidSession(cause) => {
            warn!(error = %cause, "Session verification failed")
        }
        other => error!(error = %other, "Failed to load caller profile"),
    })?;

    debug!(user_id = %identity.id, "Authenticated request");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

// =============================================================================
// Extractor
// =============================================================================

/// Axum extractor for the identity attached by [`auth_middleware`].
///
/// Rejects with `401 {"error": "Unauthorized - Authentication required"}`
/// when the request carries no identity.
#[derive(Debug, Clone)]
pub struct RequireIdentity(pub Identity);

impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(RequireIdentity)
            .ok_or(AuthError::MissingIdentity)
    }
}

// =============================================================================
// Tests
// =============================================================================
