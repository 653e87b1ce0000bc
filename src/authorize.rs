//! Outbound request decoration and authorization-failure recovery.
//!
//! Sits between the application and the transport: attaches the current
//! credential to outgoing requests, and when a request comes back 401
//! runs the single-flight refresh and replays the request exactly once.
//! Issuance endpoints (login/refresh/logout) are exempt from both: a
//! stale or replaced token must never reach the issuer itself.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use thiserror::Error;

use crate::config::IssuanceConfig;
use crate::refresh::RefreshCoordinator;
use crate::session::SessionState;

/// Transport-level failure (connection refused, timeout, ...). Distinct
/// from an error *status*, which arrives as a normal response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport failed: {0}")]
    Network(String),
}

/// Executes the network call for an outbound request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &OutboundRequest,
    ) -> Result<Response<Vec<u8>>, TransportError>;
}

/// An outbound request as this crate sees it: enough to decorate it and
/// to replay it unchanged after a refresh.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub body: Option<Vec<u8>>,
    pub headers: HeaderMap,
    pub method: Method,
    pub path: String,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            body: None,
            headers: HeaderMap::new(),
            method,
            path: path.into(),
        }
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Path component without any query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }
}

/// Decorates outbound requests with the current credential and recovers
/// once from authorization failures.
pub struct RequestAuthorizer {
    issuance: IssuanceConfig,
    refresh: Arc<RefreshCoordinator>,
    session: Arc<SessionState>,
    transport: Arc<dyn Transport>,
}

impl RequestAuthorizer {
    pub fn new(
        session: Arc<SessionState>,
        refresh: Arc<RefreshCoordinator>,
        transport: Arc<dyn Transport>,
        issuance: IssuanceConfig,
    ) -> Self {
        Self {
            issuance,
            refresh,
            session,
            transport,
        }
    }

    /// Send a request through the transport, decorated with the current
    /// credential, recovering at most once from a 401.
    ///
    /// All statuses other than 401 and all transport errors pass through
    /// unchanged. A 401 on a non-issuance endpoint triggers the
    /// single-flight refresh; on refresh success the request is replayed
    /// exactly once and that response is final whatever its status; on
    /// refresh failure the original 401 response is returned and the
    /// session is left cleared.
    pub async fn send(
        &self,
        request: OutboundRequest,
    ) -> Result<Response<Vec<u8>>, TransportError> {
        let issuance = self.issuance.is_issuance(request.route());
        let decorated = self.decorate(request, issuance);
        let response = self.transport.execute(&decorated).await?;

        if response.status() != StatusCode::UNAUTHORIZED || issuance {
            return Ok(response);
        }

        match self.refresh.refresh().await {
            Ok(credential) => {
                tracing::debug!(
                    path = %decorated.route(),
                    "Replaying request with refreshed credential"
                );
                let replayed = Self::with_bearer(decorated, &credential.token);
                self.transport.execute(&replayed).await
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    path = %decorated.route(),
                    "Refresh failed; surfacing the original response"
                );
                Ok(response)
            }
        }
    }

    fn decorate(&self, request: OutboundRequest, issuance: bool) -> OutboundRequest {
        if issuance {
            return request;
        }
        match self.session.valid_credential() {
            Some(credential) => Self::with_bearer(request, &credential.token),
            None => request,
        }
    }

    fn with_bearer(mut request: OutboundRequest, token: &str) -> OutboundRequest {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                request.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token is not a legal header value; sending undecorated");
            }
        }
        request
    }
}
