//! Remote issuer collaborator contract.
//!
//! The issuer mints and revokes credentials (login/refresh/logout). The
//! transport behind these operations lives outside this crate. Refresh
//! relies on context-ambient re-authentication material (typically an
//! http-only cookie) and therefore takes no arguments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from issuer operations.
///
/// Clonable so a single refresh outcome can fan out to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssuerError {
    #[error("Issuer unreachable: {0}")]
    Unavailable(String),
    #[error("Issuer rejected the request: {status}")]
    Rejected { status: u16 },
}

/// Login credentials, as posted to the issuer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub password: String,
    pub username: String,
}

/// Remote operations that mint or revoke credentials.
///
/// Implementations perform the network round-trip and return the raw
/// token string on success; this crate never sees the wire format.
#[async_trait]
pub trait Issuer: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<String, IssuerError>;

    /// Obtain a fresh token for the current principal.
    async fn refresh(&self) -> Result<String, IssuerError>;

    async fn logout(&self) -> Result<(), IssuerError>;
}
