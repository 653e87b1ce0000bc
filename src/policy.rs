//! Route access decisions.
//!
//! Pure decision functions consumed by the navigation collaborator. The
//! only I/O is a single refresh attempt when the credential looks
//! expired but recovery might still succeed.

use std::sync::Arc;

use crate::config::RouteConfig;
use crate::refresh::RefreshCoordinator;
use crate::session::SessionState;

/// What the navigation collaborator should do with an attempted route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny { redirect: String },
}

impl AccessDecision {
    fn deny(redirect: impl Into<String>) -> Self {
        AccessDecision::Deny {
            redirect: redirect.into(),
        }
    }
}

/// Performs navigation on behalf of decisions and cross-context logout.
pub trait Navigator: Send + Sync {
    fn go(&self, destination: &str);
}

/// Access requirements a route declares.
#[derive(Debug, Clone, Default)]
pub struct RouteSpec {
    /// Roles that must NOT be held; checked before `required_roles`
    pub excluded_roles: Vec<String>,
    /// At least one must be held (empty = no role requirement)
    pub required_roles: Vec<String>,
    pub requires_auth: bool,
}

/// Decides route access from authentication and role state.
pub struct RoutePolicy {
    refresh: Arc<RefreshCoordinator>,
    routes: RouteConfig,
    session: Arc<SessionState>,
}

impl RoutePolicy {
    pub fn new(
        session: Arc<SessionState>,
        refresh: Arc<RefreshCoordinator>,
        routes: RouteConfig,
    ) -> Self {
        Self {
            refresh,
            routes,
            session,
        }
    }

    /// Decide whether the current session may enter a route.
    pub async fn decide(&self, route: &RouteSpec) -> AccessDecision {
        if route.requires_auth && !self.ensure_auth().await {
            // The failed refresh already cleared the session
            return AccessDecision::deny(self.routes.login.as_str());
        }

        let credential = match self.session.valid_credential() {
            Some(credential) => credential,
            None if route.requires_auth => {
                return AccessDecision::deny(self.routes.login.as_str())
            }
            // Anonymous visitor on a route without an auth requirement
            None => return AccessDecision::Allow,
        };

        // Exclusion wins over any matching requirement
        if route
            .excluded_roles
            .iter()
            .any(|role| credential.has_role(role))
        {
            tracing::debug!(subject = %credential.subject, "Route excludes a held role");
            return AccessDecision::deny(self.routes.role_home(&credential));
        }

        if !route.required_roles.is_empty()
            && !route
                .required_roles
                .iter()
                .any(|role| credential.has_role(role))
        {
            tracing::debug!(subject = %credential.subject, "Route requires an unheld role");
            return AccessDecision::deny(self.routes.home.as_str());
        }

        AccessDecision::Allow
    }

    /// The inverse rule for the login route: an authenticated subject is
    /// sent to its default destination instead of the login form.
    pub async fn decide_login(&self) -> AccessDecision {
        if self.ensure_auth().await {
            if let Some(credential) = self.session.valid_credential() {
                return AccessDecision::deny(self.routes.role_home(&credential));
            }
        }
        AccessDecision::Allow
    }

    /// True once the session is valid, attempting one refresh if it is
    /// not.
    async fn ensure_auth(&self) -> bool {
        if self.session.is_valid() {
            return true;
        }
        self.refresh.refresh().await.is_ok() && self.session.is_valid()
    }
}
