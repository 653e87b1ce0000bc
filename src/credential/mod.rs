//! Decoded bearer-token attributes used for authorization decisions.
//!
//! The client never verifies the token signature (it holds no key). It
//! only reads the claims it needs (expiry, subject, roles) to decide
//! what to attach and where to navigate; the server stays the authority
//! on whether a token is actually accepted.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

mod claims;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Token is not a three-part bearer token")]
    Format,
    #[error("Payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Missing required claim: {0}")]
    MissingClaim(&'static str),
    #[error("Expiry timestamp out of range")]
    Expiry,
}

/// The decoded attributes of a bearer token.
#[derive(Debug, Clone)]
pub struct Credential {
    /// When the credential stops being valid
    pub expires_at: DateTime<Utc>,
    /// Role names granted to the subject
    pub roles: HashSet<String>,
    /// Stable identifier of the authenticated principal
    pub subject: String,
    /// The opaque bearer string, exactly as issued
    pub token: String,
}

impl Credential {
    /// Decode a raw token into its credential attributes.
    pub fn decode(raw: &str) -> Result<Self, CredentialError> {
        let claims = claims::decode_payload(raw)?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(CredentialError::Expiry)?;

        Ok(Self {
            expires_at,
            roles: claims.roles.into_iter().collect(),
            subject: claims.sub,
            token: raw.to_string(),
        })
    }

    /// Whether the credential is valid at the given instant.
    ///
    /// Validity is derived on every check, never cached.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Whether the credential is valid right now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Whether the subject holds the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
