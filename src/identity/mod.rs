//! Caller identity.
//!
//! The identity provider turns an inbound session credential into verified
//! [`SessionClaims`], and a subject id into a full [`UserProfile`]. The auth
//! middleware combines both into an [`Identity`].
//!
//! [`ClerkClient`] talks to the Clerk Backend API; tests substitute their own
//! [`IdentityProvider`].

mod clerk;
pub mod jwks;
mod model;

use async_trait::async_trait;

use crate::error::IdentityError;

pub use clerk::{
    ClerkClient, CLOCK_SKEW_LEEWAY_SECS, DEFAULT_CLERK_API_URL, DEFAULT_IDENTITY_TIMEOUT,
    MIN_KEY_REFRESH_INTERVAL,
};
pub use model::{EmailAddress, Identity, SessionClaims, UserProfile};

/// Session verification and profile lookup.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a session token and return its claims.
    async fn verify_session(&self, token: &str) -> Result<SessionClaims, IdentityError>;

    /// Fetch the profile of `user_id`.
    async fn get_user(&self, user_id: &str) -> Result<UserProfile, IdentityError>;
}
