//! Shared test helpers — available to all `#[cfg(test)]` modules in the crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use http::{Response, StatusCode};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::authorize::{OutboundRequest, Transport, TransportError};
use crate::issuer::{Issuer, IssuerError, LoginRequest};
use crate::policy::Navigator;
use crate::sync::{BroadcastMedium, SyncError, SyncMessage};

/// Build a decodeable `header.payload.signature` token.
pub fn make_token(subject: &str, roles: &[&str], ttl: Duration) -> String {
    make_token_at(subject, roles, Utc::now() + ttl)
}

pub fn make_token_at(subject: &str, roles: &[&str], expires_at: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({
            "exp": expires_at.timestamp(),
            "roles": roles,
            "sub": subject,
        })
        .to_string(),
    );
    format!("{header}.{payload}.sig")
}

/// Issuer with scripted outcomes and a refresh call counter.
#[derive(Default)]
pub struct StubIssuer {
    /// When set, refresh waits here before resolving, letting tests
    /// pile up concurrent callers deterministically.
    pub gate: Option<Arc<Notify>>,
    pub login_result: Mutex<Option<Result<String, IssuerError>>>,
    pub logout_result: Mutex<Option<Result<(), IssuerError>>>,
    pub refresh_calls: AtomicUsize,
    pub refresh_results: Mutex<VecDeque<Result<String, IssuerError>>>,
}

impl StubIssuer {
    pub fn scripted(refresh_results: Vec<Result<String, IssuerError>>) -> Self {
        Self {
            refresh_results: Mutex::new(refresh_results.into()),
            ..Default::default()
        }
    }

    pub fn with_refresh(refresh_results: Vec<Result<String, IssuerError>>) -> Arc<Self> {
        Arc::new(Self::scripted(refresh_results))
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Issuer for StubIssuer {
    async fn login(&self, _request: &LoginRequest) -> Result<String, IssuerError> {
        self.login_result
            .lock()
            .take()
            .unwrap_or(Err(IssuerError::Rejected { status: 401 }))
    }

    async fn refresh(&self) -> Result<String, IssuerError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.refresh_results
            .lock()
            .pop_front()
            .unwrap_or(Err(IssuerError::Unavailable("no scripted outcome".into())))
    }

    async fn logout(&self) -> Result<(), IssuerError> {
        self.logout_result.lock().take().unwrap_or(Ok(()))
    }
}

/// Transport returning scripted responses and recording every request.
#[derive(Default)]
pub struct ScriptedTransport {
    pub requests: Mutex<Vec<OutboundRequest>>,
    pub responses: Mutex<VecDeque<Result<(StatusCode, Vec<u8>), TransportError>>>,
}

impl ScriptedTransport {
    pub fn with_statuses(statuses: &[u16]) -> Arc<Self> {
        let responses = statuses
            .iter()
            .map(|status| Ok((StatusCode::from_u16(*status).unwrap(), Vec::new())))
            .collect();
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(responses),
        })
    }

    pub fn recorded(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        request: &OutboundRequest,
    ) -> Result<Response<Vec<u8>>, TransportError> {
        self.requests.lock().push(request.clone());
        let (status, body) = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or(Ok((StatusCode::OK, Vec::new())))?;
        Ok(Response::builder().status(status).body(body).unwrap())
    }
}

/// Medium that records what it is asked to broadcast.
#[derive(Default)]
pub struct RecordingMedium {
    pub published: Mutex<Vec<SyncMessage>>,
}

impl RecordingMedium {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl BroadcastMedium for RecordingMedium {
    fn publish(&self, message: &SyncMessage) -> Result<(), SyncError> {
        self.published.lock().push(message.clone());
        Ok(())
    }
}

/// Records every navigation it is asked to perform.
#[derive(Default)]
pub struct RecordingNavigator {
    pub destinations: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn go(&self, destination: &str) {
        self.destinations.lock().push(destination.to_string());
    }
}
