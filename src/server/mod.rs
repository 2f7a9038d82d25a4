//! HTTP server layer for the scan API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                 GET /health        GET /scans                   │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────┐  ┌───────────┐  │
//! │  │  handlers   │  │    auth     │  │  routes  │  │ shutdown  │  │
//! │  │ (requests)  │  │  (session)  │  │ (layers) │  │ (drain)   │  │
//! │  └─────────────┘  └─────────────┘  └──────────┘  └───────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
mod connection;
pub mod handlers;
pub mod routes;
pub mod shutdown;

pub use auth::{auth_middleware, session_token, AuthError, RequireIdentity, SessionAuth};
pub use handlers::{
    health_handler, scans_handler, AppState, ErrorResponse, HealthResponse, DEFAULT_ENVIRONMENT,
};
pub use routes::{create_router, RouterConfig, DEFAULT_REQUEST_TIMEOUT};
pub use shutdown::{
    serve, shutdown_signal, ServeOptions, IDLE_TIMEOUT, READ_TIMEOUT, SHUTDOWN_GRACE_PERIOD,
    WRITE_TIMEOUT,
};
