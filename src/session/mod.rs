//! Single source of truth for the current credential.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::credential::{Credential, CredentialError};

mod service;

pub use service::{LoginError, LogoutError, SessionService};

/// Why a session was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearCause {
    /// The subject logged out in this context
    Logout,
    /// The installed token could not be decoded
    Malformed,
    /// A sibling context logged out
    PeerLogout,
    /// The refresh round-trip failed
    RefreshFailed,
}

/// Where a credential install came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    /// Adopted from a sibling context's broadcast
    Peer,
}

/// Emitted exactly once per observable state change.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Cleared {
        cause: ClearCause,
    },
    Updated {
        credential: Credential,
        origin: Origin,
    },
}

const EVENT_BUFFER: usize = 32;

/// Holds the current credential for one execution context.
///
/// Sole owner of the credential: every other component reads through
/// the accessors and never keeps a copy past a single decision.
pub struct SessionState {
    current: RwLock<Option<Credential>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            current: RwLock::new(None),
            events,
        }
    }

    /// Observe state changes (cross-context sync, UI bindings).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Decode and install a token obtained in this context.
    ///
    /// A token that fails to decode forces the cleared state and the
    /// error is returned to the caller.
    pub fn set_session(&self, raw: &str) -> Result<Credential, CredentialError> {
        self.install(raw, Origin::Local)
    }

    /// Install a token broadcast by a sibling context.
    pub fn adopt_peer_token(&self, raw: &str) -> Result<Credential, CredentialError> {
        self.install(raw, Origin::Peer)
    }

    fn install(&self, raw: &str, origin: Origin) -> Result<Credential, CredentialError> {
        let credential = match Credential::decode(raw) {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected malformed token");
                self.clear(ClearCause::Malformed);
                return Err(e);
            }
        };

        *self.current.write() = Some(credential.clone());
        tracing::debug!(
            subject = %credential.subject,
            expires_at = %credential.expires_at,
            "Installed credential"
        );
        let _ = self.events.send(SessionEvent::Updated {
            credential: credential.clone(),
            origin,
        });

        Ok(credential)
    }

    /// Remove the credential. Idempotent: clearing an already-empty
    /// session is a side-effect-free no-op.
    pub fn clear(&self, cause: ClearCause) {
        let removed = self.current.write().take();
        if removed.is_some() {
            tracing::debug!(?cause, "Cleared session");
            let _ = self.events.send(SessionEvent::Cleared { cause });
        }
    }

    /// Snapshot of the current credential, valid or not.
    pub fn credential(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    /// The current credential, only while it is valid.
    pub fn valid_credential(&self) -> Option<Credential> {
        let now = Utc::now();
        self.current.read().clone().filter(|c| c.is_valid_at(now))
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Validity at a given instant, recomputed on every check.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.current
            .read()
            .as_ref()
            .is_some_and(|c| c.is_valid_at(now))
    }

    /// Whether a valid credential grants the given role.
    pub fn has_role(&self, role: &str) -> bool {
        let now = Utc::now();
        self.current
            .read()
            .as_ref()
            .is_some_and(|c| c.is_valid_at(now) && c.has_role(role))
    }

    pub fn subject(&self) -> Option<String> {
        self.current.read().as_ref().map(|c| c.subject.clone())
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_token;
    use chrono::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_set_session_emits_local_update() {
        let state = SessionState::new();
        let mut events = state.subscribe();

        let credential = state
            .set_session(&make_token("user-1", &["ADMIN"], Duration::hours(1)))
            .unwrap();
        assert_eq!(credential.subject, "user-1");
        assert!(state.is_valid());
        assert_eq!(state.subject().as_deref(), Some("user-1"));

        match events.try_recv().unwrap() {
            SessionEvent::Updated { credential, origin } => {
                assert_eq!(credential.subject, "user-1");
                assert_eq!(origin, Origin::Local);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_adopt_peer_token_emits_peer_update() {
        let state = SessionState::new();
        let mut events = state.subscribe();

        state
            .adopt_peer_token(&make_token("user-1", &[], Duration::hours(1)))
            .unwrap();

        match events.try_recv().unwrap() {
            SessionEvent::Updated { origin, .. } => assert_eq!(origin, Origin::Peer),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_token_forces_cleared_state() {
        let state = SessionState::new();
        state
            .set_session(&make_token("user-1", &[], Duration::hours(1)))
            .unwrap();
        let mut events = state.subscribe();

        assert!(state.set_session("garbage").is_err());
        assert!(!state.is_valid());
        assert!(state.credential().is_none());

        match events.try_recv().unwrap() {
            SessionEvent::Cleared { cause } => assert_eq!(cause, ClearCause::Malformed),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_clear_is_idempotent() {
        let state = SessionState::new();
        state
            .set_session(&make_token("user-1", &[], Duration::hours(1)))
            .unwrap();
        let mut events = state.subscribe();

        state.clear(ClearCause::Logout);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::Cleared {
                cause: ClearCause::Logout
            }
        ));

        // Clearing an empty session emits nothing
        state.clear(ClearCause::Logout);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_expired_credential_is_present_but_invalid() {
        let state = SessionState::new();
        state
            .set_session(&make_token("user-1", &["ADMIN"], Duration::hours(-1)))
            .unwrap();

        assert!(state.credential().is_some());
        assert!(!state.is_valid());
        assert!(!state.has_role("ADMIN"));
    }

    #[test]
    fn test_validity_follows_simulated_time() {
        let state = SessionState::new();
        let credential = state
            .set_session(&make_token("user-1", &[], Duration::hours(1)))
            .unwrap();

        let expires_at = credential.expires_at;
        assert!(state.is_valid_at(expires_at - Duration::minutes(1)));
        assert!(!state.is_valid_at(expires_at));
        assert!(!state.is_valid_at(expires_at + Duration::minutes(1)));
    }

    #[test]
    fn test_has_role_on_valid_credential() {
        let state = SessionState::new();
        state
            .set_session(&make_token("user-1", &["KIOSK"], Duration::hours(1)))
            .unwrap();

        assert!(state.has_role("KIOSK"));
        assert!(!state.has_role("ADMIN"));
    }
}
