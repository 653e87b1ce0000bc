//! Cross-context session synchronization.
//!
//! Logging out in one context logs out every sibling; a token refreshed
//! in one context is adopted by the others instead of each paying its
//! own issuer round-trip. Broadcasts are fire-and-forget with no
//! acknowledgement: against a concurrent local refresh in another
//! context, the last write observed wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::policy::Navigator;
use crate::session::{ClearCause, Origin, SessionEvent, SessionState};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Broadcast medium unavailable: {0}")]
    Medium(String),
}

/// The two messages sibling contexts exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SyncMessage {
    Logout,
    Token { expires_at: i64, token: String },
}

/// Fire-and-forget delivery to every sibling context.
///
/// Implementations normally do not deliver a context's own messages
/// back to it; if one does, application is harmless: peer-origin
/// changes are never republished and clearing twice is a no-op.
pub trait BroadcastMedium: Send + Sync {
    fn publish(&self, message: &SyncMessage) -> Result<(), SyncError>;
}

/// Mirrors session changes to and from sibling contexts.
///
/// Without a medium the publisher degrades to a no-op and the context
/// runs standalone; local sessions stay correct either way.
pub struct ContextSync {
    login_destination: String,
    medium: Option<Arc<dyn BroadcastMedium>>,
    navigator: Arc<dyn Navigator>,
    session: Arc<SessionState>,
}

impl ContextSync {
    pub fn new(
        session: Arc<SessionState>,
        medium: Option<Arc<dyn BroadcastMedium>>,
        navigator: Arc<dyn Navigator>,
        login_destination: impl Into<String>,
    ) -> Arc<Self> {
        if medium.is_none() {
            tracing::debug!("No broadcast medium; context runs standalone");
        }
        Arc::new(Self {
            login_destination: login_destination.into(),
            medium,
            navigator,
            session,
        })
    }

    /// Start mirroring local session changes to sibling contexts.
    pub fn spawn_publisher(self: &Arc<Self>) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        let mut events = self.session.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => sync.publish_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Publisher lagged behind session events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Drain messages arriving from sibling contexts.
    pub fn spawn_receiver(
        self: &Arc<Self>,
        mut incoming: mpsc::UnboundedReceiver<SyncMessage>,
    ) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = incoming.recv().await {
                sync.apply(message);
            }
        })
    }

    fn publish_event(&self, event: &SessionEvent) {
        let Some(medium) = &self.medium else { return };

        let message = match event {
            SessionEvent::Updated {
                credential,
                origin: Origin::Local,
            } => SyncMessage::Token {
                expires_at: credential.expires_at.timestamp(),
                token: credential.token.clone(),
            },
            SessionEvent::Cleared {
                cause: ClearCause::Logout,
            } => SyncMessage::Logout,
            // Peer-adopted changes and local failure clears stay local
            _ => return,
        };

        if let Err(e) = medium.publish(&message) {
            tracing::warn!(error = %e, "Broadcast publish failed");
        }
    }

    /// Apply a broadcast received from a sibling context.
    pub fn apply(&self, message: SyncMessage) {
        match message {
            SyncMessage::Token { token, .. } => {
                if let Err(e) = self.session.adopt_peer_token(&token) {
                    tracing::warn!(error = %e, "Ignoring malformed peer token");
                }
            }
            SyncMessage::Logout => {
                tracing::debug!("Sibling context logged out");
                self.session.clear(ClearCause::PeerLogout);
                self.navigator.go(&self.login_destination);
            }
        }
    }
}
