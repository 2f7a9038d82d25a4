//! Per-connection progress tracking.
//!
//! hyper bounds how long a client may take to send request headers. The
//! remaining socket bounds live here. A connection that makes no read or
//! write progress for the idle timeout is closed, and so is one whose
//! pending write stays blocked past the write timeout.

use std::fmt::Display;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;
use tracing::debug;

const NO_BLOCKED_WRITE: u64 = u64::MAX;

/// Socket bounds enforced while a connection is open.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionLimits {
    pub write: Duration,
    pub idle: Duration,
}

/// Progress timestamps shared by a [`TrackedStream`] and its watchdog.
///
/// Times are milliseconds since the connection was accepted.
#[derive(Debug)]
pub(crate) struct Activity {
    origin: Instant,
    last_progress_ms: AtomicU64,
    write_blocked_ms: AtomicU64,
}

impl Activity {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_progress_ms: AtomicU64::new(0),
            write_blocked_ms: AtomicU64::new(NO_BLOCKED_WRITE),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(NO_BLOCKED_WRITE - 1)
    }

    fn record_progress(&self) {
        self.last_progress_ms.store(self.elapsed_ms(), Ordering::Relaxed);
    }

    fn record_write_blocked(&self) {
        // Keep the first instant of a blocked streak.
        let _ = self.write_blocked_ms.compare_exchange(
            NO_BLOCKED_WRITE,
            self.elapsed_ms(),
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    fn record_write_unblocked(&self) {
        self.write_blocked_ms.store(NO_BLOCKED_WRITE, Ordering::Relaxed);
    }

    fn instant_at(&self, ms: u64, after: Duration) -> Instant {
        self.origin + Duration::from_millis(ms) + after
    }

    /// Earliest instant at which one of the limits could expire.
    fn next_deadline(&self, limits: &ConnectionLimits) -> Instant {
        let idle = self.instant_at(self.last_progress_ms.load(Ordering::Relaxed), limits.idle);
        match self.write_blocked_ms.load(Ordering::Relaxed) {
            NO_BLOCKED_WRITE => idle,
            since => idle.min(self.instant_at(since, limits.write)),
        }
    }

    /// The limit that has expired, if any.
    fn expired(&self, limits: &ConnectionLimits) -> Option<&'static str> {
        let now = Instant::now();

        let blocked = self.write_blocked_ms.load(Ordering::Relaxed);
        if blocked != NO_BLOCKED_WRITE && now >= self.instant_at(blocked, limits.write) {
            return Some("write timeout");
        }

        let last = self.last_progress_ms.load(Ordering::Relaxed);
        if now >= self.instant_at(last, limits.idle) {
            return Some("idle timeout");
        }

        None
    }
}

/// An I/O stream that records read and write progress into [`Activity`].
pub(crate) struct TrackedStream<S> {
    inner: S,
    activity: Arc<Activity>,
}

impl<S> TrackedStream<S> {
    pub(crate) fn new(inner: S, activity: Arc<Activity>) -> Self {
        Self { inner, activity }
    }

    fn track_write(&self, poll: &Poll<io::Result<usize>>) {
        match poll {
            Poll::Pending => self.activity.record_write_blocked(),
            Poll::Ready(Ok(written)) => {
                self.activity.record_write_unblocked();
                if *written > 0 {
                    self.activity.record_progress();
                }
            }
            Poll::Ready(Err(_)) => self.activity.record_write_unblocked(),
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TrackedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            this.activity.record_progress();
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TrackedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        this.track_write(&poll);
        poll
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        this.track_write(&poll);
        poll
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Drive `conn` to completion, dropping it once a limit expires.
pub(crate) async fn drive_connection<C, E>(
    conn: C,
    activity: Arc<Activity>,
    limits: ConnectionLimits,
    peer: SocketAddr,
) where
    C: Future<Output = Result<(), E>>,
    E: Display,
{
    tokio::pin!(conn);

    loop {
        let deadline = activity.next_deadline(&limits);
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    debug!(%peer, error = %e, "Connection ended with error");
                }
                return;
            }
            _ = tokio::time::sleep_until(deadline) => {
                if let Some(reason) = activity.expired(&limits) {
                    debug!(%peer, reason, "Closing stalled connection");
                    return;
                }
            }
        }
    }
}
