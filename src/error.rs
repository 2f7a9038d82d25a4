use std::time::Duration;

use thiserror::Error;

/// Errors returned by the store backend client
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The request could not be completed (connect failure, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a status other than the expected one
    #[error("Unexpected status code: expected {expected}, got {actual}")]
    UnexpectedStatus { expected: u16, actual: u16 },

    /// The base URL or collection could not be turned into a request URL
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

/// Errors returned by repositories built on top of the store
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The store call failed
    #[error("Query error: {0}")]
    Query(#[from] StoreError),

    /// The store answered, but the body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// A record could not be encoded for the store
    #[error("Encode error: {0}")]
    Encode(String),
}

/// Errors returned by the identity provider
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The request could not be completed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status
    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    /// The provider's response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// The session token is malformed, expired, or fails signature checks
    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    /// No verification key matches the token
    #[error("No verification key for kid {0:?}")]
    KeyNotFound(Option<String>),

    /// The provider secret key is not configured
    #[error("Identity provider secret key is not configured")]
    MissingSecret,
}

impl IdentityError {
    /// Whether this error means the caller's credential is bad, as opposed
    /// to the provider being unreachable or misbehaving.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            IdentityError::InvalidToken(_) | IdentityError::KeyNotFound(_)
        )
    }
}

/// Errors that end the server run
#[derive(Debug, Error)]
pub enum ServeError {
    /// In-flight requests did not finish within the shutdown grace period
    #[error("Graceful shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}
