use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::RepositoryError;
use crate::store::{Direction, Query, Store};

use super::{NewScan, Scan};

/// Collection holding scan records.
pub const SCANS_COLLECTION: &str = "scans";

/// Reads and writes scan records through a [`Store`].
///
/// Every query is scoped to an owner id supplied by the caller; the
/// repository never reads or writes scans across owners.
pub struct ScanRepository<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for ScanRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> ScanRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Query for all scans owned by `owner_id`, newest first.
    pub fn owner_query(owner_id: &str) -> Query {
        Query::new(SCANS_COLLECTION)
            .filter_eq("user_id", owner_id)
            .order_by("created_at", Direction::Descending)
    }

    /// Fetch the scans owned by `owner_id`, newest first.
    pub async fn get_scans(&self, owner_id: &str) -> Result<Vec<Scan>, RepositoryError> {
        let body = self
            .store
            .select(&Self::owner_query(owner_id))
            .await
            .inspect_err(|e| error!(owner_id, error = %e, "Error querying scans"))?;

        let scans: Vec<Scan> = serde_json::from_slice(&body).map_err(|e| {
            error!(owner_id, error = %e, "Error decoding scans");
            RepositoryError::Decode(e.to_string())
        })?;

        debug!(owner_id, count = scans.len(), "Fetched scans");
        Ok(scans)
    }

    /// Create a pending scan owned by `owner_id` and return the stored record.
    pub async fn create_scan(&self, owner_id: &str) -> Result<Scan, RepositoryError> {
        let new_scan = NewScan::pending(owner_id);
        let record =
            serde_json::to_vec(&new_scan).map_err(|e| RepositoryError::Encode(e.to_string()))?;

        let body = self
            .store
            .insert(SCANS_COLLECTION, Bytes::from(record))
            .await
            .inspect_err(|e| error!(owner_id, error = %e, "Error inserting scan"))?;

        let scan = decode_single(&body).inspect_err(|e| {
            error!(owner_id, error = %e, "Error decoding created scan");
        })?;

        debug!(owner_id, scan_id = %scan.id, "Created scan");
        Ok(scan)
    }
}

/// Decode one record from an insert response.
///
/// PostgREST returns inserted rows as an array; a bare object is accepted too.
fn decode_single(body: &[u8]) -> Result<Scan, RepositoryError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let row = match value {
        Value::Array(rows) => rows
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Decode("insert returned no rows".to_string()))?,
        other => other,
    };

    serde_json::from_value(row).map_err(|e| RepositoryError::Decode(e.to_string()))
}
