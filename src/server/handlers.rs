//! HTTP request handlers for the scan API.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness probe (public)
//! - `GET /scans` - List the caller's scans, newest first (authenticated)

use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::error::RepositoryError;
use crate::scan::{Scan, ScanRepository};
use crate::store::Store;

use super::auth::RequireIdentity;

/// Environment name reported when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "development";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state handed to every handler.
pub struct AppState<S: Store> {
    /// Scan persistence
    pub scans: ScanRepository<S>,

    /// When the process started serving, for the reported uptime
    pub started_at: Instant,

    /// Deployment environment name (e.g., "production")
    pub environment: String,
}

impl<S: Store> AppState<S> {
    /// Create state around a scan repository, starting the uptime clock now.
    pub fn new(scans: ScanRepository<S>) -> Self {
        Self {
            scans,
            started_at: Instant::now(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }

    /// Set the reported environment name.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Measure uptime from `started_at` instead of from construction.
    pub fn with_started_at(mut self, started_at: Instant) -> Self {
        self.started_at = started_at;
        self
    }
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            scans: self.scans.clone(),
            started_at: self.started_at,
            environment: self.environment.clone(),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// The generic body used for every 500 response.
    pub fn internal() -> Self {
        Self::new("Internal Server Error")
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,

    /// Time the response was produced
    pub timestamp: DateTime<Utc>,

    /// Deployment environment name
    pub environment: String,

    /// Service version
    pub version: String,

    /// Runtime identifier (language, OS, architecture)
    pub runtime: String,

    /// Human-readable time since start, millisecond precision (e.g., "1h 2m 3s 4ms")
    pub uptime: String,
}

impl HealthResponse {
    fn new(environment: &str, uptime: Duration) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            environment: environment.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            runtime: runtime_identifier(),
            uptime: format_uptime(uptime),
        }
    }
}

fn runtime_identifier() -> String {
    format!(
        "rust/{}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Format a duration truncated to whole milliseconds.
pub fn format_uptime(uptime: Duration) -> String {
    let millis = Duration::from_millis(uptime.as_millis() as u64);
    humantime::format_duration(millis).to_string()
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert repository failures to HTTP responses.
///
/// The cause is logged; the client only ever sees a generic 500.
impl IntoResponse for RepositoryError {
    fn into_response(self) -> Response {
        error!(error = %self, "Scan repository request failed");

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal()),
        )
            .into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body and caching disabled:
/// ```json
/// {
///   "status": "healthy",
///   "timestamp": "2024-05-01T10:00:00.123Z",
///   "environment": "production",
///   "version": "1.0.0",
///   "runtime": "rust/linux-x86_64",
///   "uptime": "3h 12m 5s 120ms"
/// }
/// ```
pub async fn health_handler<S: Store>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let body = HealthResponse::new(&state.environment, state.started_at.elapsed());

    (
        [
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Json(body),
    )
}

/// List the authenticated caller's scans.
///
/// # Endpoint
///
/// `GET /scans`
///
/// # Response
///
/// `200 OK` with a JSON array ordered by `created_at` descending; `[]` when
/// the caller has no scans.
///
/// # Errors
///
/// - `401 Unauthorized`: No identity attached to the request
/// - `500 Internal Server Error`: Store failure or undecodable store response
pub async fn scans_handler<S: Store>(
    State(state): State<AppState<S>>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<Vec<Scan>>, RepositoryError> {
    let scans = state.scans.get_scans(&identity.id).await?;
    debug!(user_id = %identity.id, count = scans.len(), "Listed scans");
    Ok(Json(scans))
}

// =============================================================================
// Tests
// =============================================================================
