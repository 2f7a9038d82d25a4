//! Router configuration for the scan API.
//!
//! # Route Structure
//!
//! ```text
//! /health   - Health check (public)
//! /scans    - List the caller's scans (authenticated)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use influscan_api::identity::ClerkClient;
//! use influscan_api::scan::ScanRepository;
//! use influscan_api::server::{create_router, AppState, RouterConfig};
//! use influscan_api::store::RestStore;
//!
//! let store = RestStore::new("https://project.supabase.co", "service-key")?;
//! let state = AppState::new(ScanRepository::new(store)).with_environment("production");
//!
//! let clerk = ClerkClient::new("https://api.clerk.com/v1", Some("sk_live_...".into()))?;
//! let config = RouterConfig::new(Arc::new(clerk))
//!     .with_cors_origins(vec!["https://app.example.com".to_string()]);
//!
//! let router = create_router(state, config);
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Method, StatusCode};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::auth::{auth_middleware, SessionAuth, HEALTH_PATH};
use super::handlers::{health_handler, scans_handler, AppState};
use crate::identity::IdentityProvider;
use crate::store::Store;

/// Upper bound on handling a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Provider used to authenticate requests (None = authentication disabled)
    pub identity: Option<Arc<dyn IdentityProvider>>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Per-request deadline
    pub request_timeout: Duration,
}

impl RouterConfig {
    /// Create a router configuration that authenticates through `identity`.
    ///
    /// By default CORS allows any origin, tracing is enabled, and requests
    /// time out after [`DEFAULT_REQUEST_TIMEOUT`].
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity: Some(identity),
            ..Self::without_auth()
        }
    }

    /// Create a configuration with the authentication middleware disabled.
    ///
    /// Handlers that need an identity then answer 401 on every request.
    pub fn without_auth() -> Self {
        Self {
            identity: None,
            cors_origins: None,
            enable_tracing: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Set the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// Layers, from the outside in: tracing (optional), CORS, request timeout,
/// session authentication (when configured).
pub fn create_router<S>(app_state: AppState<S>, config: RouterConfig) -> Router
where
    S: Store + 'static,
{
    let router = Router::new()
        .route(HEALTH_PATH, get(health_handler::<S>))
        .route("/scans", get(scans_handler::<S>))
        .with_state(app_state);

    let router = match &config.identity {
        Some(provider) => router.layer(middleware::from_fn_with_state(
            SessionAuth::new(Arc::clone(provider)),
            auth_middleware,
        )),
        None => router,
    };

    let router = router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
