//! Single-flight credential refresh.
//!
//! Many callers can demand a refresh at once, typically several
//! requests failing with an expired token in the same tick. Only one
//! round-trip against the issuer is ever outstanding per execution
//! context: the first caller launches the flight, everyone else joins
//! its waiters and observes the same outcome. Callers enqueue a oneshot
//! and await it — no lock is held during the network round-trip.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::credential::Credential;
use crate::issuer::{Issuer, IssuerError};
use crate::session::{ClearCause, SessionState};

#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Issuer(#[from] IssuerError),
    #[error("Issuer returned an unusable token: {0}")]
    Credential(String),
    #[error("Refresh was interrupted before an outcome was produced")]
    Interrupted,
}

type Outcome = Result<Credential, RefreshError>;

#[derive(Default)]
struct Flight {
    in_flight: bool,
    /// Resolved in push order when the flight lands
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Coordinates refresh demands so at most one issuer round-trip is
/// outstanding at any time.
pub struct RefreshCoordinator {
    flight: Mutex<Flight>,
    issuer: Arc<dyn Issuer>,
    session: Arc<SessionState>,
}

impl RefreshCoordinator {
    pub fn new(session: Arc<SessionState>, issuer: Arc<dyn Issuer>) -> Arc<Self> {
        Arc::new(Self {
            flight: Mutex::new(Flight::default()),
            issuer,
            session,
        })
    }

    /// Demand a fresh credential.
    ///
    /// A caller arriving while a refresh is in flight joins its waiters
    /// and observes that flight's outcome, never a later one. Failure is
    /// terminal for the session: it is cleared and nothing is retried.
    pub async fn refresh(self: &Arc<Self>) -> Result<Credential, RefreshError> {
        let (tx, rx) = oneshot::channel();
        let launch = {
            let mut flight = self.flight.lock();
            flight.waiters.push(tx);
            if flight.in_flight {
                false
            } else {
                flight.in_flight = true;
                true
            }
        };

        if launch {
            // The flight runs detached so a caller dropped mid-await can
            // never leave the coordinator stuck in flight.
            let coordinator = Arc::clone(self);
            tokio::spawn(async move { coordinator.fly().await });
        }

        match rx.await {
            Ok(outcome) => outcome,
            // The flight task died before resolving
            Err(_) => Err(RefreshError::Interrupted),
        }
    }

    async fn fly(&self) {
        let outcome = self.round_trip().await;

        // Drain waiters and land under a single lock acquisition so a
        // late arrival either sees this flight or starts the next one.
        let waiters = {
            let mut flight = self.flight.lock();
            flight.in_flight = false;
            std::mem::take(&mut flight.waiters)
        };

        tracing::debug!(
            waiters = waiters.len(),
            ok = outcome.is_ok(),
            "Refresh landed"
        );
        for waiter in waiters {
            // A waiter whose context was torn down is simply gone
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn round_trip(&self) -> Outcome {
        match self.issuer.refresh().await {
            Ok(raw) => match self.session.set_session(&raw) {
                Ok(credential) => Ok(credential),
                // set_session already forced the cleared state
                Err(e) => Err(RefreshError::Credential(e.to_string())),
            },
            Err(e) => {
                tracing::debug!(error = %e, "Refresh rejected by issuer");
                self.session.clear(ClearCause::RefreshFailed);
                Err(RefreshError::Issuer(e))
            }
        }
    }
}
