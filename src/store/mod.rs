//! Store backend access.
//!
//! All durable state lives in an external PostgREST-style service. This
//! module provides the [`Store`] abstraction the repositories are written
//! against, the typed [`Query`] value, and [`RestStore`], the HTTP
//! implementation.
//!
//! ```text
//! ┌──────────────────┐     ┌───────────┐     ┌──────────────────────────┐
//! │  ScanRepository  │ ──▶ │   Store   │ ──▶ │ GET/POST {base}/rest/v1/ │
//! └──────────────────┘     └───────────┘     └──────────────────────────┘
//! ```

mod query;
mod rest;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

pub use query::{Direction, Filter, Order, Query};
pub use rest::{RestStore, DEFAULT_STORE_TIMEOUT};

/// Authenticated read/insert access to the store backend.
///
/// Implementations return the raw response body; decoding is left to the
/// caller so that transport failures and malformed data stay distinguishable.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run a read query and return the full response body.
    ///
    /// Succeeds only on HTTP 200.
    async fn select(&self, query: &Query) -> Result<Bytes, StoreError>;

    /// Insert one JSON-encoded record into `collection` and return the full
    /// response body.
    ///
    /// Succeeds only on HTTP 201.
    async fn insert(&self, collection: &str, record: Bytes) -> Result<Bytes, StoreError>;
}
