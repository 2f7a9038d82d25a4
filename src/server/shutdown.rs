//! Serving with connection timeouts and a bounded graceful shutdown.
//!
//! Connections are served through hyper's auto (HTTP/1 and HTTP/2) builder.
//! Request headers must arrive within the read timeout, a blocked response
//! write is dropped after the write timeout, and a connection without
//! traffic is closed after the idle timeout.
//!
//! After the shutdown signal fires the listener stops accepting, in-flight
//! requests are given the shutdown grace period to finish, and the run
//! fails with [`ServeError::ShutdownTimeout`] if they do not.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::connection::{drive_connection, Activity, ConnectionLimits, TrackedStream};
use crate::error::ServeError;

/// Time in-flight requests get to complete after the shutdown signal.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Time a client has to send the request headers.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a response write may stay blocked on the client.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a connection may stay open without traffic.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Pause after a failed `accept`, e.g. when out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Listener timeouts and the shutdown deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeOptions {
    /// Bound on receiving a complete request head
    pub read_timeout: Duration,

    /// Bound on a response write that makes no progress
    pub write_timeout: Duration,

    /// Bound on a connection with no traffic
    pub idle_timeout: Duration,

    /// Bound on draining in-flight requests after the signal
    pub shutdown_grace: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            read_timeout: READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            idle_timeout: IDLE_TIMEOUT,
            shutdown_grace: SHUTDOWN_GRACE_PERIOD,
        }
    }
}

impl ServeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            write: self.write_timeout,
            idle: self.idle_timeout,
        }
    }
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

/// Serve `router` on `listener` until `signal` resolves, then drain.
///
/// Returns `Ok(())` once every open connection has finished, or
/// [`ServeError::ShutdownTimeout`] if draining takes longer than
/// `options.shutdown_grace`.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    signal: F,
    options: ServeOptions,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send,
{
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(options.read_timeout);

    let limits = options.connection_limits();
    let graceful = GracefulShutdown::new();
    tokio::pin!(signal);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            },
            _ = &mut signal => break,
        };

        let activity = Arc::new(Activity::new());
        let io = TokioIo::new(TrackedStream::new(stream, Arc::clone(&activity)));
        let service = TowerToHyperService::new(router.clone());

        let conn = builder
            .serve_connection_with_upgrades(io, service)
            .into_owned();
        let conn = graceful.watch(conn);

        tokio::spawn(drive_connection(conn, activity, limits, peer));
    }

    drop(listener);

    let grace = options.shutdown_grace;
    info!(grace_ms = grace.as_millis() as u64, "Shutting down, draining in-flight requests");

    tokio::time::timeout(grace, graceful.shutdown())
        .await
        .map_err(|_| ServeError::ShutdownTimeout(grace))
}
