//! InfluScan API - per-user scan records behind session authentication.
//!
//! This binary loads configuration, wires the store and identity provider
//! into the router, and serves until SIGINT/SIGTERM.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use influscan_api::{
    config::Config,
    error::ServeError,
    identity::{ClerkClient, IdentityProvider},
    scan::ScanRepository,
    server::{create_router, serve, shutdown_signal, AppState, RouterConfig, ServeOptions},
    store::RestStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let started_at = Instant::now();
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting influscan-api v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Environment: {}", config.environment);
    info!("  Store: {}", config.supabase_url);
    info!("  Identity provider: {}", config.clerk_api_url);
    match &config.cors_origins {
        Some(origins) => info!("  CORS origins: {}", origins.join(", ")),
        None => info!("  CORS origins: any"),
    }

    if !config.has_clerk_secret() {
        warn!("  CLERK_SECRET_KEY is not set - every authenticated request will be rejected");
    }

    let store = match RestStore::new(&config.supabase_url, config.supabase_key.clone()) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to create store client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let clerk = match ClerkClient::new(&config.clerk_api_url, config.clerk_secret_key.clone()) {
        Ok(clerk) => clerk,
        Err(e) => {
            error!("Failed to create identity provider client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.has_clerk_secret() {
        match clerk.refresh_keys().await {
            Ok(count) => info!("  Loaded {} session verification key(s)", count),
            Err(e) => warn!("  Could not prefetch session verification keys: {}", e),
        }
    }

    let state = AppState::new(ScanRepository::new(store))
        .with_environment(config.environment.clone())
        .with_started_at(started_at);

    let router = create_router(state, build_router_config(&config, Arc::new(clerk)));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let options = ServeOptions::default();
    info!("Server listening on http://{}", addr);
    info!(
        "  Timeouts: read {:?}, write {:?}, idle {:?}",
        options.read_timeout, options.write_timeout, options.idle_timeout
    );

    match serve(listener, router, shutdown_signal(), options).await {
        Ok(()) => {
            info!("Server exited");
            ExitCode::SUCCESS
        }
        Err(ServeError::ShutdownTimeout(grace)) => {
            error!("Server forced to shutdown: requests still running after {:?}", grace);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "influscan_api=debug,tower_http=debug"
    } else {
        "influscan_api=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config, identity: Arc<dyn IdentityProvider>) -> RouterConfig {
    let mut router_config = RouterConfig::new(identity);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}
