//! Identity-provider boundary.
//!
//! ARCHITECTURE
//! ============
//! The session store never talks HTTP directly. It holds an
//! `Arc<dyn IdentityProvider>`, so the REST client in [`http`] and the mocks
//! used by tests are interchangeable.
//!
//! Auth-state notifications travel over a `tokio::sync::broadcast` hub
//! ([`AuthEvents`]). Each subscriber gets its own [`AuthSubscription`];
//! dropping or calling [`AuthSubscription::unsubscribe`] releases it.

pub mod http;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::AuthError;

const AUTH_EVENT_CAPACITY: usize = 32;

// =============================================================================
// PAYLOADS
// =============================================================================

/// User payload as the provider reports it, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Profile metadata the user controls (`name`, `department`, ...).
    #[serde(default)]
    pub user_metadata: serde_json::Map<String, serde_json::Value>,
    /// Operator-managed metadata; the only trusted source of `role`.
    #[serde(default)]
    pub app_metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A live provider session: the issued bearer token plus its user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: ProviderUser,
}

/// Profile data submitted alongside a signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignUpMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub role: String,
}

impl SignUpMetadata {
    /// Metadata for a self-service signup; role is always `user`.
    #[must_use]
    pub fn new(name: &str, department: Option<&str>) -> Self {
        Self {
            name: name.trim().to_owned(),
            department: department.map(str::trim).filter(|d| !d.is_empty()).map(str::to_owned),
            role: "user".to_owned(),
        }
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Provider-originated auth event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One notification: the event tag and the session it carries, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthEventKind,
    pub session: Option<ProviderSession>,
}

impl AuthChange {
    #[must_use]
    pub fn signed_in(session: ProviderSession) -> Self {
        Self { event: AuthEventKind::SignedIn, session: Some(session) }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { event: AuthEventKind::SignedOut, session: None }
    }
}

/// Publish side of the auth notification channel.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthChange>,
}

impl AuthEvents {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self { tx }
    }

    /// Deliver `change` to every live subscriber. No subscribers is not an error.
    pub fn publish(&self, change: AuthChange) {
        let event = change.event;
        let delivered = self.tx.send(change).unwrap_or(0);
        debug!(?event, delivered, "auth event published");
    }

    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription { rx: self.tx.subscribe() }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive side of the auth notification channel.
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    /// Wait for the next notification. `None` once the provider is gone.
    ///
    /// A lagging subscriber skips what it missed; the next event it does see
    /// triggers a full resync anyway.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "auth subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Release the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// External identity service consumed by the session store.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession, AuthError>;

    /// Create an account and, when the provider allows it, a session.
    async fn sign_up(&self, email: &str, password: &str, metadata: &SignUpMetadata)
    -> Result<ProviderSession, AuthError>;

    /// Invalidate the provider-side session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The currently valid session, if any. Stale tokens yield `Ok(None)`.
    async fn get_session(&self) -> Result<Option<ProviderSession>, AuthError>;

    /// Seed the provider with a token recovered from a persisted snapshot.
    fn restore_session(&self, _access_token: &str) {}

    /// Subscribe to provider-originated auth events.
    fn subscribe(&self) -> AuthSubscription;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
