use serde::{Deserialize, Serialize};

/// Normalized caller identity, built once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl Identity {
    /// Build an identity from a provider profile.
    ///
    /// The email is the primary address when one is flagged, otherwise the
    /// first listed address. Missing names become empty strings.
    pub fn from_profile(profile: UserProfile) -> Self {
        let email = profile
            .primary_email()
            .or_else(|| profile.email_addresses.first())
            .map(|e| e.email_address.clone())
            .unwrap_or_default();

        Self {
            id: profile.id,
            email,
            first_name: profile.first_name.unwrap_or_default(),
            last_name: profile.last_name.unwrap_or_default(),
        }
    }
}

/// Verified claims of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user id
    pub sub: String,

    /// Session id
    #[serde(default)]
    pub sid: Option<String>,

    /// Expiration time (Unix seconds)
    pub exp: u64,

    /// Issued-at time (Unix seconds)
    #[serde(default)]
    pub iat: Option<u64>,

    /// Authorized party (origin the token was minted for)
    #[serde(default)]
    pub azp: Option<String>,
}

/// One email address on a user profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

/// User profile as returned by the identity provider's user lookup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub id: String,

    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,

    #[serde(default)]
    pub primary_email_address_id: Option<String>,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,
}

impl UserProfile {
    fn primary_email(&self) -> Option<&EmailAddress> {
        let primary = self.primary_email_address_id.as_deref()?;
        self.email_addresses.iter().find(|e| e.id == primary)
    }
}
