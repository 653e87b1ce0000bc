//! punchcard-session - client-side session and request-authorization core
//! for a time-tracking client.
//!
//! This crate provides the credential lifecycle coordination every
//! execution context (tab, window) of the client runs:
//! - Session state holding the decoded credential, with derived validity
//! - Single-flight refresh against the remote issuer with FIFO fan-out
//! - Bearer decoration of outbound requests and one-shot 401 recovery
//! - Route access decisions by authentication and role state
//! - Fire-and-forget login/logout mirroring across sibling contexts
//!
//! The HTTP transport, the credential issuer, navigation, and the
//! broadcast medium are collaborators behind traits; the crate decides
//! what to send, when to retry, and where to redirect.

pub mod authorize;
pub mod config;
pub mod credential;
pub mod issuer;
pub mod policy;
pub mod refresh;
pub mod session;
pub mod sync;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use authorize::{RequestAuthorizer, Transport};
use config::Config;
use issuer::Issuer;
use policy::{Navigator, RoutePolicy};
use refresh::RefreshCoordinator;
use session::{SessionService, SessionState};
use sync::{BroadcastMedium, ContextSync};

/// One execution context's session components, wired together.
///
/// Exactly one `SessionCore` exists per context. All coordination state
/// lives inside its components; nothing is ambient or static.
pub struct SessionCore {
    pub authorizer: RequestAuthorizer,
    pub config: Config,
    pub policy: RoutePolicy,
    pub refresh: Arc<RefreshCoordinator>,
    pub service: SessionService,
    pub session: Arc<SessionState>,
    pub sync: Arc<ContextSync>,
}

impl SessionCore {
    /// Wire up a fresh context. Pass `medium: None` where no broadcast
    /// medium exists; the context then runs standalone.
    pub fn new(
        config: Config,
        issuer: Arc<dyn Issuer>,
        transport: Arc<dyn Transport>,
        medium: Option<Arc<dyn BroadcastMedium>>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let session = Arc::new(SessionState::new());
        let refresh = RefreshCoordinator::new(Arc::clone(&session), Arc::clone(&issuer));
        let authorizer = RequestAuthorizer::new(
            Arc::clone(&session),
            Arc::clone(&refresh),
            transport,
            config.issuance.clone(),
        );
        let policy = RoutePolicy::new(
            Arc::clone(&session),
            Arc::clone(&refresh),
            config.routes.clone(),
        );
        let service = SessionService::new(Arc::clone(&session), issuer);
        let sync = ContextSync::new(
            Arc::clone(&session),
            medium,
            navigator,
            config.routes.login.as_str(),
        );

        Self {
            authorizer,
            config,
            policy,
            refresh,
            service,
            session,
            sync,
        }
    }
}
