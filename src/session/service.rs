//! Login and logout flows against the remote issuer.

use std::sync::Arc;

use thiserror::Error;

use crate::credential::{Credential, CredentialError};
use crate::issuer::{Issuer, IssuerError, LoginRequest};

use super::{ClearCause, SessionState};

#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Issuer(#[from] IssuerError),
    #[error("Issuer returned an unusable token: {0}")]
    Credential(#[from] CredentialError),
}

#[derive(Debug, Error)]
pub enum LogoutError {
    #[error(transparent)]
    Issuer(#[from] IssuerError),
}

/// Drives login and logout on behalf of the UI collaborator.
pub struct SessionService {
    issuer: Arc<dyn Issuer>,
    session: Arc<SessionState>,
}

impl SessionService {
    pub fn new(session: Arc<SessionState>, issuer: Arc<dyn Issuer>) -> Self {
        Self { issuer, session }
    }

    /// Exchange login credentials for a session.
    pub async fn login(&self, request: LoginRequest) -> Result<Credential, LoginError> {
        let raw = self.issuer.login(&request).await?;
        let credential = self.session.set_session(&raw)?;
        tracing::info!(subject = %credential.subject, "Logged in");
        Ok(credential)
    }

    /// Revoke the session at the issuer and clear it locally.
    ///
    /// The local session is cleared even when the remote revocation
    /// fails; the failure is still surfaced to the caller.
    pub async fn logout(&self) -> Result<(), LogoutError> {
        let result = self.issuer.logout().await;
        self.session.clear(ClearCause::Logout);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Issuer logout failed; session cleared locally");
        }
        result.map_err(LogoutError::from)
    }
}
