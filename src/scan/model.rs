use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Status assigned to every newly created scan.
pub const STATUS_PENDING: &str = "pending";

/// A scan record as stored in the `scans` collection.
///
/// `created_at` is carried as the backend's own text. Rows written by other
/// clients may hold naive or offset timestamps, and `/scans` passes them
/// through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    /// Backend-assigned identifier
    pub id: String,

    /// Identity that owns the scan
    pub user_id: String,

    /// Creation time as stored by the backend
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,

    /// Lifecycle state, advanced by the backend
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

/// Nullable text columns decode to an empty string.
fn null_as_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Insert payload for a new scan. The backend assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewScan {
    pub user_id: String,
    pub created_at: String,
    pub status: String,
}

impl NewScan {
    /// A pending scan owned by `user_id`, stamped with the current time.
    pub fn pending(user_id: impl Into<String>) -> Self {
        Self::pending_at(user_id, Utc::now())
    }

    /// A pending scan owned by `user_id`, stamped with `now`.
    pub fn pending_at(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            status: STATUS_PENDING.to_string(),
        }
    }
}
