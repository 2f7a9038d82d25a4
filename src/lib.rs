//! # InfluScan API
//!
//! An HTTP service exposing per-user scan records. Callers authenticate
//! with a session token from the identity provider; scans live in a
//! PostgREST-compatible store.
//!
//! ## Architecture
//!
//! - [`store`] - Store abstraction and the PostgREST client
//! - [`scan`] - Scan records and the scan repository
//! - [`identity`] - Session verification and user profiles
//! - [`server`] - Axum-based HTTP server, auth middleware, and shutdown
//! - [`config`] - CLI and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use influscan_api::{
//!     create_router, serve, shutdown_signal, AppState, ClerkClient, RestStore, RouterConfig,
//!     ScanRepository, ServeOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RestStore::new("https://project.supabase.co", "service-key")?;
//!     let clerk = ClerkClient::new("https://api.clerk.com/v1", Some("sk_live".to_string()))?;
//!
//!     let state = AppState::new(ScanRepository::new(store));
//!     let router = create_router(state, RouterConfig::new(Arc::new(clerk)));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     serve(listener, router, shutdown_signal(), ServeOptions::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod scan;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{IdentityError, RepositoryError, ServeError, StoreError};
pub use identity::{ClerkClient, Identity, IdentityProvider, SessionClaims, UserProfile};
pub use scan::{NewScan, Scan, ScanRepository, STATUS_PENDING};
pub use server::{
    auth_middleware, create_router, health_handler, scans_handler, serve, shutdown_signal,
    AppState, AuthError, ErrorResponse, HealthResponse, RequireIdentity, RouterConfig,
    ServeOptions, SHUTDOWN_GRACE_PERIOD,
};
pub use store::{Query, RestStore, Store};
